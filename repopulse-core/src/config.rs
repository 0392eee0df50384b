//! Configuration management

use crate::async_utils::RetryConfig;
use crate::error::{ErrorContext, PulseError, PulseResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for an analysis deployment
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub upstream: UpstreamConfig,
    pub analysis: AnalysisConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Upstream code-hosting API settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Personal access token; anonymous requests when absent
    pub token: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
    pub per_page: u32,
    pub max_commit_pages: u32,
    pub max_contributor_pages: u32,
    pub max_branch_pages: u32,
    pub max_issue_pages: u32,
    /// Upper bound on in-flight requests sharing one credential
    pub max_concurrent_requests: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            token: None,
            timeout_seconds: 30,
            user_agent: format!("repopulse/{}", env!("CARGO_PKG_VERSION")),
            per_page: 100,
            max_commit_pages: 5,
            max_contributor_pages: 10,
            max_branch_pages: 10,
            max_issue_pages: 10,
            max_concurrent_requests: 4,
        }
    }
}

/// Aggregation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub top_contributors: usize,
    pub top_files: usize,
    /// Most recent commits inspected for per-file churn
    pub file_sample_size: usize,
    /// Decimal places kept in percentages
    pub percentage_precision: u32,
    pub timeout_secs: u64,
    /// Only count commits newer than this many days
    pub commit_since_days: Option<u32>,
    /// Window for the "recently active" health check
    pub recent_activity_days: i64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_contributors: 10,
            top_files: 10,
            file_sample_size: 30,
            percentage_precision: 1,
            timeout_secs: 60,
            commit_since_days: None,
            recent_activity_days: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// sqlx SQLite URL; in-memory history when absent
    pub database_url: Option<String>,
}

impl PulseConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> PulseResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PulseError::Config {
            message: format!("Failed to read config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("read_file")
                .with_suggestion("Check if the config file exists and is readable"),
        })?;

        let config: PulseConfig = toml::from_str(&content).map_err(|e| PulseError::Config {
            message: format!("Failed to parse config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("parse_toml")
                .with_suggestion("Check TOML syntax in config file"),
        })?;

        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> PulseResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| PulseError::Config {
            message: format!("Failed to serialize config: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config").with_operation("serialize_toml"),
        })?;

        std::fs::write(path, content).map_err(|e| PulseError::Config {
            message: format!("Failed to write config file: {}", e),
            source: Some(Box::new(e)),
            context: ErrorContext::new("config")
                .with_operation("write_file")
                .with_suggestion("Check if the directory exists and is writable"),
        })?;

        Ok(())
    }

    /// Overlay `GITHUB_TOKEN`, `GITHUB_API_BASE_URL` and `DATABASE_URL`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.upstream.token = Some(token);
        }
        if let Some(base_url) = lookup("GITHUB_API_BASE_URL").filter(|u| !u.trim().is_empty()) {
            self.upstream.base_url = base_url;
        }
        if let Some(database_url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
            self.storage.database_url = Some(database_url);
        }
    }

    pub fn validate(&self) -> PulseResult<()> {
        let checks: [(bool, &str, &str); 7] = [
            (
                self.upstream.per_page == 0 || self.upstream.per_page > 100,
                "upstream.per_page must be between 1 and 100",
                "Set upstream.per_page to 100",
            ),
            (
                self.upstream.max_commit_pages == 0,
                "upstream.max_commit_pages must be greater than 0",
                "Set upstream.max_commit_pages to a positive value",
            ),
            (
                self.upstream.max_concurrent_requests == 0,
                "upstream.max_concurrent_requests must be greater than 0",
                "Set upstream.max_concurrent_requests to a positive value",
            ),
            (
                self.retry.max_attempts == 0,
                "retry.max_attempts must be greater than 0",
                "Set retry.max_attempts to at least 1",
            ),
            (
                self.analysis.timeout_secs == 0,
                "analysis.timeout_secs must be greater than 0",
                "Set analysis.timeout_secs to a positive value",
            ),
            (
                self.analysis.percentage_precision > 4,
                "analysis.percentage_precision must be at most 4",
                "Use 1 or 2 decimal places",
            ),
            (
                url::Url::parse(&self.upstream.base_url).is_err(),
                "upstream.base_url is not a valid URL",
                "Use https://api.github.com",
            ),
        ];

        for (failed, message, suggestion) in checks {
            if failed {
                return Err(PulseError::Config {
                    message: message.to_string(),
                    source: None,
                    context: ErrorContext::new("config")
                        .with_operation("validate")
                        .with_suggestion(suggestion),
                });
            }
        }

        Ok(())
    }
}
