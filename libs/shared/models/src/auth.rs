use std::fmt;
use std::str::FromStr;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The only signing algorithm tokens may declare.
pub const EXPECTED_ALG: &str = "HS256";

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
}

impl JwtHeader {
    pub fn hs256() -> Self {
        Self {
            alg: EXPECTED_ALG.to_string(),
            typ: Some("JWT".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// What a token may be used for. Reset tokens never pass as bearer tokens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenScope {
    #[default]
    Access,
    PasswordReset,
}

/// Wire form of the claims segment. Fields are lenient on decode so that a
/// missing claim is reported as malformed claims rather than a parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub role: String,
    pub iat: Option<i64>,
    pub exp: Option<i64>,
    #[serde(default)]
    pub scope: TokenScope,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub subject: String,
    pub role: Role,
}

impl AuthUser {
    /// Role gate shared by the middleware and `TokenAuthority::authorize`.
    /// An exact match is required; a mismatch is 403, never 401.
    pub fn require_role(&self, required: Role) -> Result<(), AppError> {
        if self.role != required {
            tracing::debug!("{} with role {} denied, {} required", self.subject, self.role, required);
            return Err(AppError::Forbidden(format!("{} access required", required)));
        }
        Ok(())
    }
}

/// Handlers behind `auth_middleware` take `AuthUser` directly; without the
/// middleware the extractor rejects with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthenticated("Authorization token required".to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub valid: bool,
    pub subject: String,
    pub role: Role,
}
