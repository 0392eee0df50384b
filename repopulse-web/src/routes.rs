//! Route definitions for the RepoPulse web server

use crate::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};

/// Routes served at the root
pub fn service_routes() -> Router<AppState> {
    Router::new().route("/", get(handlers::service_info))
}

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health and service
        .route("/health", get(handlers::health_check))
        .route("/stats", get(handlers::get_stats))
        .route("/openapi.json", get(handlers::openapi_json))
        // Analysis
        .route("/analyze", post(handlers::analyze_repository))
        // History
        .route("/analyses", get(handlers::list_analyses))
        .route("/past-analyses", get(handlers::list_analyses))
        .route(
            "/analyses/{id}",
            get(handlers::get_analysis).delete(handlers::delete_analysis),
        )
}
