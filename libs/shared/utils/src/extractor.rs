use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequest, State},
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
    Json,
};

use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;

use crate::jwt::TokenAuthority;

/// JSON body extractor whose rejection is an `AppError`, so a malformed or
/// incomplete payload answers 400 with the usual JSON error body.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Pulls the token out of an `Authorization: Bearer <token>` header.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let auth_value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("Missing authorization header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthenticated("Invalid authorization header format".to_string()))?;

    match auth_value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AppError::Unauthenticated("Invalid authorization header format".to_string())),
    }
}

// Middleware for authentication
pub async fn auth_middleware(
    State(authority): State<Arc<TokenAuthority>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;

    let user = authority.validate(token)?;

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Must sit inside `auth_middleware`: rejects identities whose role differs
/// from the one given as state.
pub async fn require_role(
    State(required): State<Role>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| AppError::Unauthenticated("Authorization token required".to_string()))?;

    user.require_role(required)?;

    Ok(next.run(request).await)
}
