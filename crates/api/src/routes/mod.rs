pub mod config;
pub mod health;
pub mod messaging;
pub mod upload;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use tower_http::limit::RequestBodyLimitLayer;

use herald_common::error::AppError;

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    let max_body = state.config.max_upload_bytes;

    Router::new()
        .merge(health::router())
        .merge(upload::router())
        .merge(config::router())
        .merge(messaging::router())
        .fallback(not_found)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
