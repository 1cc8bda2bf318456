use std::sync::Arc;

use axum::{routing::get, Router};

use auth_cell::router::auth_routes;
use auth_cell::AuthState;
use shared_models::error::AppError;

pub fn create_router(state: Arc<AuthState>) -> Result<Router, AppError> {
    Ok(Router::new()
        .route("/", get(|| async { "Agri API is running!" }))
        .nest("/auth", auth_routes(state)?))
}
