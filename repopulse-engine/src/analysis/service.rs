//! Analysis service
//!
//! Entry point shared by every outer surface: parse, analyze, persist.

use super::errors::{AnalysisError, AnalysisResult};
use super::metrics::{AnalysisMetrics, AnalysisMetricsSnapshot};
use super::orchestrator::Analyzer;
use crate::history::{HistoryStore, MemoryHistoryStore};
use repopulse_core::{
    log_operation_error, log_operation_start, log_operation_success, performance, AnalysisSnapshot,
    AnalysisSummary, PulseConfig, PulseError, PulseResult, RepositoryReference,
};
use repopulse_repo::{ApiClientConfig, GitHubApiClient, PaginationLimits, UpstreamClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Analysis plus history, behind one handle
#[derive(Clone)]
pub struct AnalysisService {
    analyzer: Analyzer,
    store: Arc<dyn HistoryStore>,
    metrics: Arc<AnalysisMetrics>,
    default_timeout: Duration,
}

impl AnalysisService {
    pub fn new(analyzer: Analyzer, store: Arc<dyn HistoryStore>) -> Self {
        let default_timeout = Duration::from_secs(analyzer.config().timeout_secs);
        Self {
            analyzer,
            store,
            metrics: Arc::new(AnalysisMetrics::new()),
            default_timeout,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Build the GitHub client and the configured history backend.
    ///
    /// Without a database URL the history lives in memory.
    pub async fn from_config(config: &PulseConfig) -> PulseResult<Self> {
        config.validate()?;

        let client = GitHubApiClient::with_settings(
            ApiClientConfig::from(&config.upstream),
            PaginationLimits::from(&config.upstream),
            config.retry.clone(),
        )?;
        let analyzer = Analyzer::new(
            Arc::new(client) as Arc<dyn UpstreamClient>,
            config.analysis.clone(),
        );

        let store = Self::open_store(config).await?;
        info!(backend = store.backend_name(), "Analysis history ready");

        Ok(Self::new(analyzer, store))
    }

    #[cfg(feature = "sqlite")]
    async fn open_store(config: &PulseConfig) -> PulseResult<Arc<dyn HistoryStore>> {
        match config.storage.database_url.as_deref() {
            Some(url) => Ok(Arc::new(
                crate::history::SqliteHistoryStore::from_url(url).await?,
            )),
            None => Ok(Arc::new(MemoryHistoryStore::new())),
        }
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open_store(config: &PulseConfig) -> PulseResult<Arc<dyn HistoryStore>> {
        if config.storage.database_url.is_some() {
            warn!("Database URL configured but SQLite support is disabled, using memory history");
        }
        Ok(Arc::new(MemoryHistoryStore::new()))
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn store(&self) -> Arc<dyn HistoryStore> {
        Arc::clone(&self.store)
    }

    /// Parse `input`, analyze the repository and persist the snapshot.
    ///
    /// Malformed input is rejected before any upstream request is made.
    pub async fn analyze_and_record(
        &self,
        input: &str,
        timeout: Option<Duration>,
    ) -> AnalysisResult<AnalysisSnapshot> {
        let reference = RepositoryReference::parse(input)?;
        let timeout = timeout.unwrap_or(self.default_timeout);

        log_operation_start!("analyze_repository", repository = %reference);
        self.metrics.record_started();
        let started = Instant::now();

        let result = performance::measure_async("analyze_repository", async {
            let snapshot = self.analyzer.analyze(&reference, timeout).await?;
            self.store.create(snapshot).await.map_err(logged)
        })
        .await;

        match result {
            Ok(snapshot) => {
                self.metrics
                    .record_completed(started.elapsed(), snapshot.is_degraded());
                if snapshot.is_degraded() {
                    warn!(
                        repository = %reference,
                        degraded_sections = snapshot.degraded_sections.len(),
                        "Analysis completed with degraded sections"
                    );
                }
                log_operation_success!(
                    "analyze_repository",
                    repository = %reference,
                    id = snapshot.id.unwrap_or_default()
                );
                Ok(snapshot)
            }
            Err(error) => {
                self.metrics.record_failed(started.elapsed());
                log_operation_error!("analyze_repository", error, repository = %reference);
                Err(error)
            }
        }
    }

    pub async fn list(&self) -> AnalysisResult<Vec<AnalysisSummary>> {
        self.store.list().await.map_err(logged)
    }

    pub async fn get(&self, id: i64) -> AnalysisResult<AnalysisSnapshot> {
        self.store.get(id).await.map_err(logged)
    }

    pub async fn delete(&self, id: i64) -> AnalysisResult<()> {
        self.store.delete(id).await.map_err(logged)?;
        info!(id = id, "Deleted analysis");
        Ok(())
    }

    pub async fn health_check(&self) -> AnalysisResult<()> {
        self.store.health_check().await.map_err(logged)
    }

    pub fn metrics(&self) -> AnalysisMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// History store failures are logged with their error id before being mapped
fn logged(error: PulseError) -> AnalysisError {
    error.log();
    AnalysisError::from(error)
}
