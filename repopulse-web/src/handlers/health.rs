//! Service, health and stats handlers

use super::types::{HealthResponse, ServiceInfo, StatsResponse};
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use tracing::warn;

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    summary = "Service information",
    responses(
        (status = 200, description = "Service name and version", body = ServiceInfo)
    )
)]
pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "RepoPulse API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/api/openapi.json".to_string(),
    })
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "Health",
    summary = "Health check",
    description = "Check the server and history store health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
        (status = 503, description = "History store unreachable", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = state.service.store().backend_name().to_string();
    let (status, label) = match state.service.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(e) => {
            warn!(error = %e, "History store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        }
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            timestamp: chrono::Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            storage,
        }),
    )
}

/// Analysis counters
#[utoipa::path(
    get,
    path = "/api/stats",
    tag = "Health",
    summary = "Analysis statistics",
    responses(
        (status = 200, description = "Counters since process start", body = StatsResponse)
    )
)]
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        analyses: state.service.metrics(),
        uptime_seconds: (chrono::Utc::now() - state.started_at).num_seconds(),
        storage: state.service.store().backend_name().to_string(),
    })
}

/// OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(crate::openapi::api_doc())
}
