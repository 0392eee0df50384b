//! Common types used across multiple handlers

use repopulse_engine::AnalysisMetricsSnapshot;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable message
    #[schema(example = "Not found: analysis 42")]
    pub detail: String,
    /// Stable machine-readable kind
    #[schema(example = "not_found")]
    pub error_code: String,
}

/// Service banner
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    #[schema(example = "RepoPulse API")]
    pub service: String,
    #[schema(example = "0.1.0")]
    pub version: String,
    #[schema(example = "/api/openapi.json")]
    pub docs: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    #[schema(example = "0.1.0")]
    pub version: String,
    /// History backend in use
    #[schema(example = "sqlite")]
    pub storage: String,
}

/// Analysis counters since process start
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub analyses: AnalysisMetricsSnapshot,
    pub uptime_seconds: i64,
    #[schema(example = "memory")]
    pub storage: String,
}
