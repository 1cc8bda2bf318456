use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};

use shared_models::auth::Role;
use shared_models::error::AppError;
use shared_utils::extractor::{auth_middleware, require_role};

use crate::handlers;
use crate::state::AuthState;

/// Fails only when the configured rate limit has a zero burst or period.
pub fn auth_routes(state: Arc<AuthState>) -> Result<Router, AppError> {
    // Per client IP: X-Forwarded-For / X-Real-IP / Forwarded first, then the
    // peer address from `ConnectInfo`.
    let replenish_ms = u64::try_from(state.config.rate_limit_replenish.as_millis()).unwrap_or(u64::MAX);
    let rate_limit_config = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(replenish_ms)
            .burst_size(state.config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| AppError::Internal("Invalid rate limit configuration".to_string()))?,
    );

    // Credential guessing surface: passwords, OTPs, reset tokens.
    let limited_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password", post(handlers::reset_password))
        .route("/register-phone", post(handlers::register_phone))
        .route("/verify-otp", post(handlers::verify_otp))
        .layer(GovernorLayer {
            config: rate_limit_config,
        });

    let public_routes = Router::new()
        .route("/signup", post(handlers::signup))
        .route("/logout", post(handlers::logout))
        // Token introspection
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/profile", get(handlers::get_profile))
        .layer(middleware::from_fn_with_state(state.tokens.clone(), auth_middleware));

    // Layers run outermost-last: authentication first, then the role gate.
    let admin_routes = Router::new()
        .route("/admin/ping", get(handlers::admin_ping))
        .layer(middleware::from_fn_with_state(Role::Admin, require_role))
        .layer(middleware::from_fn_with_state(state.tokens.clone(), auth_middleware));

    Ok(Router::new()
        .merge(limited_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state))
}
