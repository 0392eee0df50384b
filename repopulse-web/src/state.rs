//! Application state shared by every handler

use crate::{WebConfig, WebResult};
use chrono::{DateTime, Utc};
use repopulse_engine::AnalysisService;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: WebConfig,
    pub service: AnalysisService,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build the analysis service from `config`
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let pulse = config.load_pulse_config()?;
        let service = AnalysisService::from_config(&pulse).await?;

        info!(
            authenticated = pulse.upstream.token.is_some(),
            storage = service.store().backend_name(),
            timeout_secs = service.default_timeout().as_secs(),
            "Application state initialized"
        );

        Ok(Self::with_service(config, service))
    }

    /// State around an already built service
    pub fn with_service(config: WebConfig, service: AnalysisService) -> Self {
        Self {
            config,
            service,
            started_at: Utc::now(),
        }
    }
}
