//! Caller-facing error taxonomy for analysis operations

use repopulse_core::{ErrorKind, PulseError};
use thiserror::Error;

/// Analysis operation result type
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Failures an analysis or history operation can surface to its caller
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Input could not be parsed into a repository reference
    #[error("Invalid repository reference '{input}': {message}")]
    InvalidReference { input: String, message: String },

    /// Repository upstream, or history record, does not exist
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Mandatory upstream data could not be fetched, or the analysis timed out
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String, cause: ErrorKind },

    #[error("History store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String, error_id: String },
}

impl AnalysisError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            error_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Metadata is mandatory: only its absence keeps `NotFound`
    pub fn from_metadata_failure(error: PulseError) -> Self {
        match error {
            PulseError::NotFound { resource, .. } => Self::NotFound { resource },
            other => Self::UpstreamUnavailable {
                message: format!("repository metadata could not be fetched: {}", other),
                cause: other.kind(),
            },
        }
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidReference { .. } => ErrorKind::InvalidReference,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Convert to HTTP status code
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidReference { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::UpstreamUnavailable { .. } => 500,
            Self::StoreUnavailable { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidReference { message, .. } => format!(
                "Invalid repository URL: {}. Use https://github.com/owner/repo or owner/repo.",
                message
            ),
            Self::NotFound { resource } => format!("Not found: {}", resource),
            Self::UpstreamUnavailable {
                cause: ErrorKind::RateLimited,
                ..
            } => "GitHub API rate limit exceeded. Please try again later.".to_string(),
            Self::UpstreamUnavailable {
                cause: ErrorKind::Timeout,
                ..
            } => "Repository analysis timed out. Please try again.".to_string(),
            Self::UpstreamUnavailable { message, .. } => {
                format!("GitHub API is unavailable: {}", message)
            }
            Self::StoreUnavailable { .. } => {
                "Analysis history is temporarily unavailable.".to_string()
            }
            Self::Internal { error_id, .. } => format!(
                "An internal error occurred (reference {}). Please try again.",
                error_id
            ),
        }
    }
}

impl From<PulseError> for AnalysisError {
    fn from(error: PulseError) -> Self {
        match error {
            PulseError::InvalidReference { input, message, .. } => {
                Self::InvalidReference { input, message }
            }
            PulseError::NotFound { resource, .. } => Self::NotFound { resource },
            PulseError::StoreUnavailable { message, .. } => Self::StoreUnavailable { message },
            PulseError::RateLimited { .. }
            | PulseError::TransientNetwork { .. }
            | PulseError::Upstream { .. }
            | PulseError::UpstreamUnavailable { .. }
            | PulseError::Timeout { .. } => Self::UpstreamUnavailable {
                message: error.to_string(),
                cause: error.kind(),
            },
            other => Self::Internal {
                message: other.to_string(),
                error_id: other
                    .context()
                    .map(|context| context.error_id.clone())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            },
        }
    }
}
