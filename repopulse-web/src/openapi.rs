//! OpenAPI document for the RepoPulse API

use utoipa::OpenApi;

use crate::handlers::{
    AnalysisListResponse, AnalyzeRequest, DeleteAnalysisResponse, ErrorResponse, HealthResponse,
    ServiceInfo, StatsResponse,
};
use repopulse_core::{
    AnalysisSnapshot, AnalysisSummary, CommitActivityBucket, ContributorStat, ErrorKind,
    FileChangeStat, FileTypeShare, HealthScore, LanguageBreakdown, LanguageShare,
    SectionFailure, SnapshotSection,
};
use repopulse_engine::AnalysisMetricsSnapshot;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "RepoPulse API",
        version = "0.1.0",
        description = "GitHub repository analysis: languages, activity, contributors and file churn",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        crate::handlers::service_info,
        crate::handlers::health_check,
        crate::handlers::get_stats,
        crate::handlers::analyze_repository,
        crate::handlers::list_analyses,
        crate::handlers::get_analysis,
        crate::handlers::delete_analysis,
    ),
    components(
        schemas(
            AnalyzeRequest,
            AnalysisListResponse,
            DeleteAnalysisResponse,
            ErrorResponse,
            HealthResponse,
            ServiceInfo,
            StatsResponse,
            AnalysisMetricsSnapshot,
            AnalysisSnapshot,
            AnalysisSummary,
            LanguageBreakdown,
            LanguageShare,
            ContributorStat,
            CommitActivityBucket,
            FileChangeStat,
            FileTypeShare,
            HealthScore,
            SectionFailure,
            SnapshotSection,
            ErrorKind,
        )
    ),
    tags(
        (name = "Health", description = "Service and health endpoints"),
        (name = "Analysis", description = "Repository analysis"),
        (name = "History", description = "Stored analyses"),
    )
)]
pub struct ApiDoc;

pub fn api_doc() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
