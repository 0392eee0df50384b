//! Analysis request and response types

use repopulse_core::AnalysisSummary;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Analyze request
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    /// `https://github.com/owner/name` or `owner/name`
    #[serde(default)]
    #[schema(example = "https://github.com/octocat/Hello-World")]
    pub repo_url: String,
    /// Overrides the server's analysis timeout
    #[schema(example = 60)]
    pub timeout_secs: Option<u64>,
}

/// Past analyses, most recent first
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalysisListResponse {
    pub analyses: Vec<AnalysisSummary>,
    #[schema(example = 3)]
    pub total: usize,
}

/// Delete confirmation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteAnalysisResponse {
    #[schema(example = "Analysis deleted")]
    pub detail: String,
    #[schema(example = 42)]
    pub id: i64,
}
