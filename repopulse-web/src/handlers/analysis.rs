//! Analysis and history handlers

use super::types::{AnalysisListResponse, AnalyzeRequest, DeleteAnalysisResponse, ErrorResponse};
use crate::{AppState, JsonBody, PathParams, WebResult};
use axum::{extract::State, response::Json};
use repopulse_core::AnalysisSnapshot;
use std::time::Duration;
use tracing::info;

/// Analyze a repository and store the result
#[utoipa::path(
    post,
    path = "/api/analyze",
    tag = "Analysis",
    summary = "Analyze repository",
    description = "Fetch repository data from GitHub, aggregate metrics and store the snapshot. Sections that could not be fetched are listed in `degraded_sections`.",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Analysis stored", body = AnalysisSnapshot),
        (status = 400, description = "Malformed repository URL or request body", body = ErrorResponse),
        (status = 415, description = "Body is not JSON", body = ErrorResponse),
        (status = 422, description = "Body does not match the request schema", body = ErrorResponse),
        (status = 404, description = "Repository not found", body = ErrorResponse),
        (status = 500, description = "GitHub or history store unavailable", body = ErrorResponse)
    )
)]
pub async fn analyze_repository(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<AnalyzeRequest>,
) -> WebResult<Json<AnalysisSnapshot>> {
    info!(repo_url = %request.repo_url, "Analyze request");

    let timeout = request
        .timeout_secs
        .map(|secs| Duration::from_secs(secs.max(1)));
    let snapshot = state
        .service
        .analyze_and_record(&request.repo_url, timeout)
        .await?;

    Ok(Json(snapshot))
}

/// List past analyses
#[utoipa::path(
    get,
    path = "/api/analyses",
    tag = "History",
    summary = "List analyses",
    description = "Summaries of every stored analysis, most recent first. Also served at `/api/past-analyses`.",
    responses(
        (status = 200, description = "Stored analyses", body = AnalysisListResponse),
        (status = 500, description = "History store unavailable", body = ErrorResponse)
    )
)]
pub async fn list_analyses(State(state): State<AppState>) -> WebResult<Json<AnalysisListResponse>> {
    let analyses = state.service.list().await?;
    Ok(Json(AnalysisListResponse {
        total: analyses.len(),
        analyses,
    }))
}

/// Get one stored analysis
#[utoipa::path(
    get,
    path = "/api/analyses/{id}",
    tag = "History",
    summary = "Get analysis",
    params(
        ("id" = i64, Path, description = "Analysis id")
    ),
    responses(
        (status = 200, description = "Stored snapshot", body = AnalysisSnapshot),
        (status = 400, description = "Id is not an integer", body = ErrorResponse),
        (status = 404, description = "No analysis with this id", body = ErrorResponse),
        (status = 500, description = "History store unavailable", body = ErrorResponse)
    )
)]
pub async fn get_analysis(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> WebResult<Json<AnalysisSnapshot>> {
    Ok(Json(state.service.get(id).await?))
}

/// Delete one stored analysis
#[utoipa::path(
    delete,
    path = "/api/analyses/{id}",
    tag = "History",
    summary = "Delete analysis",
    params(
        ("id" = i64, Path, description = "Analysis id")
    ),
    responses(
        (status = 200, description = "Analysis deleted", body = DeleteAnalysisResponse),
        (status = 400, description = "Id is not an integer", body = ErrorResponse),
        (status = 404, description = "No analysis with this id", body = ErrorResponse),
        (status = 500, description = "History store unavailable", body = ErrorResponse)
    )
)]
pub async fn delete_analysis(
    State(state): State<AppState>,
    PathParams(id): PathParams<i64>,
) -> WebResult<Json<DeleteAnalysisResponse>> {
    state.service.delete(id).await?;
    Ok(Json(DeleteAnalysisResponse {
        detail: "Analysis deleted".to_string(),
        id,
    }))
}
