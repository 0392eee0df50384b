//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub type PulseResult<T> = Result<T, PulseError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Stable, machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidReference,
    NotFound,
    RateLimited,
    TransientNetwork,
    Upstream,
    UpstreamUnavailable,
    StoreUnavailable,
    Config,
    Validation,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidReference => "invalid_reference",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::Upstream => "upstream",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::StoreUnavailable => "store_unavailable",
            ErrorKind::Config => "config",
            ErrorKind::Validation => "validation",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the RepoPulse system
#[derive(Error, Debug)]
pub enum PulseError {
    #[error("Invalid repository reference '{input}': {message}")]
    InvalidReference {
        input: String,
        message: String,
        context: ErrorContext,
    },

    #[error("Resource not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after_ms: Option<u64>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    TransientNetwork {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Upstream rejected request with HTTP {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable {
        message: String,
        context: ErrorContext,
    },

    #[error("Storage unavailable: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl PulseError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            PulseError::InvalidReference { context, .. } => Some(context),
            PulseError::NotFound { context, .. } => Some(context),
            PulseError::RateLimited { context, .. } => Some(context),
            PulseError::TransientNetwork { context, .. } => Some(context),
            PulseError::Upstream { context, .. } => Some(context),
            PulseError::UpstreamUnavailable { context, .. } => Some(context),
            PulseError::StoreUnavailable { context, .. } => Some(context),
            PulseError::Config { context, .. } => Some(context),
            PulseError::Validation { context, .. } => Some(context),
            PulseError::Timeout { context, .. } => Some(context),
            PulseError::Internal { context, .. } => Some(context),
            PulseError::Io(_) | PulseError::Serialization(_) => None,
        }
    }

    /// Stable classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            PulseError::InvalidReference { .. } => ErrorKind::InvalidReference,
            PulseError::NotFound { .. } => ErrorKind::NotFound,
            PulseError::RateLimited { .. } => ErrorKind::RateLimited,
            PulseError::TransientNetwork { .. } => ErrorKind::TransientNetwork,
            PulseError::Upstream { .. } => ErrorKind::Upstream,
            PulseError::UpstreamUnavailable { .. } => ErrorKind::UpstreamUnavailable,
            PulseError::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            PulseError::Config { .. } => ErrorKind::Config,
            PulseError::Validation { .. } => ErrorKind::Validation,
            PulseError::Timeout { .. } => ErrorKind::Timeout,
            PulseError::Io(_) | PulseError::Serialization(_) | PulseError::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Check if error is recoverable by retrying the same request
    pub fn is_recoverable(&self) -> bool {
        match self {
            PulseError::TransientNetwork { .. } => true,
            PulseError::RateLimited { .. } => true,
            PulseError::Timeout { .. } => true,
            PulseError::InvalidReference { .. } => false,
            PulseError::NotFound { .. } => false,
            PulseError::Upstream { .. } => false,
            PulseError::Config { .. } => false,
            PulseError::Validation { .. } => false,
            _ => false,
        }
    }

    /// Upstream-provided resume hint in milliseconds, if any
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            PulseError::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            PulseError::Internal { .. } | PulseError::StoreUnavailable { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    kind = %self.kind(),
                    error = %self,
                    "Internal or storage error occurred"
                );
            }
            PulseError::InvalidReference { .. }
            | PulseError::Config { .. }
            | PulseError::Validation { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    kind = %self.kind(),
                    error = %self,
                    "Rejected input or configuration"
                );
            }
            PulseError::TransientNetwork { .. }
            | PulseError::RateLimited { .. }
            | PulseError::Timeout { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    kind = %self.kind(),
                    error = %self,
                    "Network, rate limit or timeout error (may be recoverable)"
                );
            }
            PulseError::NotFound { .. } => {
                debug!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    kind = %self.kind(),
                    error = %self,
                    "Requested resource does not exist"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    kind = %self.kind(),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! invalid_reference_error {
    ($input:expr, $msg:expr, $component:expr) => {
        $crate::PulseError::InvalidReference {
            input: $input.to_string(),
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_operation("parse_reference")
                .with_suggestion("Use https://github.com/owner/name or owner/name"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::PulseError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Verify the resource path or URL")
                .with_suggestion("Check if the resource exists and is accessible"),
        }
    };
}

#[macro_export]
macro_rules! store_error {
    ($msg:expr, $component:expr) => {
        $crate::PulseError::StoreUnavailable {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::PulseError::StoreUnavailable {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the database URL and that the store is reachable"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::PulseError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file"),
        }
    };
}
