//! RepoPulse web server
//!
//! Axum server with graceful shutdown on Ctrl-C.

use crate::{create_app, AppState, WebConfig, WebError, WebResult};
use axum::serve;
use repopulse_core::PulseConfig;
use tokio::net::TcpListener;
use tracing::{error, info};

pub struct RepoPulseServer {
    config: WebConfig,
    state: AppState,
}

impl RepoPulseServer {
    pub async fn new(config: WebConfig) -> WebResult<Self> {
        let state = AppState::new(config.clone()).await?;

        Ok(Self { config, state })
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> WebResult<()> {
        let address = self.config.address();

        info!(
            address = %address,
            dev_mode = self.config.dev_mode,
            storage = self.state.service.store().backend_name(),
            "Starting RepoPulse web server"
        );

        let app = create_app(self.state.clone());

        let listener = TcpListener::bind(&address)
            .await
            .map_err(WebError::Server)?;

        info!("Server listening on http://{}", address);

        if let Err(e) = serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
        {
            error!(error = %e, "Server error");
            return Err(WebError::Server(e));
        }

        info!("Server shut down");
        Ok(())
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Builder for [`RepoPulseServer`]
pub struct RepoPulseServerBuilder {
    config: WebConfig,
}

impl RepoPulseServerBuilder {
    pub fn new() -> Self {
        Self {
            config: WebConfig::default(),
        }
    }

    /// Start from an existing configuration, typically [`WebConfig::from_env`]
    pub fn from_config(config: WebConfig) -> Self {
        Self { config }
    }

    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.config.dev_mode = dev_mode;
        self
    }

    pub fn frontend_url<S: Into<String>>(mut self, frontend_url: S) -> Self {
        self.config.frontend_url = frontend_url.into();
        self
    }

    /// History database URL
    pub fn database_url<S: Into<String>>(mut self, database_url: S) -> Self {
        self.config.database_url = Some(database_url.into());
        self
    }

    pub fn config_file<S: Into<String>>(mut self, path: S) -> Self {
        self.config.config_file = Some(path.into());
        self
    }

    pub fn pulse_config(mut self, pulse: PulseConfig) -> Self {
        self.config.pulse = Some(pulse);
        self
    }

    pub async fn build(self) -> WebResult<RepoPulseServer> {
        RepoPulseServer::new(self.config).await
    }
}

impl Default for RepoPulseServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
