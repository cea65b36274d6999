//! Router configuration for the web server.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Batch submission and its event stream
        .route("/spider", post(handlers::submit_task))
        .route("/spider/download", get(handlers::download))
        .route("/spider/asin", post(handlers::store_asins))
        .route("/spider/:task_id", get(handlers::stream_task))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
