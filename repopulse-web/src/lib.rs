//! RepoPulse Web Server
//!
//! JSON API in front of the analysis engine: analyze a repository, browse and
//! delete past analyses, plus service and health endpoints.

pub mod handlers;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;

// Re-export main types
pub use server::{RepoPulseServer, RepoPulseServerBuilder};
pub use state::AppState;

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        DefaultBodyLimit, FromRequest, FromRequestParts,
    },
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Json, Response},
    Router,
};
use handlers::ErrorResponse;
use repopulse_core::{ErrorKind, LoggingConfig, PulseConfig, PulseError};
use repopulse_engine::AnalysisError;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .merge(routes::service_routes())
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .with_state(state)
}

fn cors_layer(config: &WebConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE]);

    if config.dev_mode {
        return cors.allow_origin(Any);
    }

    match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!(
                frontend_url = %config.frontend_url,
                "Invalid frontend origin, cross-origin requests will be rejected"
            );
            cors
        }
    }
}

/// Configuration for the web server
#[derive(Debug, Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Development mode allows any CORS origin
    pub dev_mode: bool,
    /// Origin of the browser frontend
    pub frontend_url: String,
    /// History database URL; in-memory history when unset
    pub database_url: Option<String>,
    /// TOML file with the analysis configuration
    pub config_file: Option<String>,
    /// Analysis configuration supplied directly, takes precedence over `config_file`
    pub pulse: Option<PulseConfig>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            dev_mode: false,
            frontend_url: "http://localhost:3000".to_string(),
            database_url: None,
            config_file: None,
            pulse: None,
        }
    }
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("REPOPULSE_HOST").unwrap_or(defaults.host),
            port: std::env::var("REPOPULSE_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(defaults.port),
            dev_mode: std::env::var("REPOPULSE_DEV_MODE")
                .ok()
                .and_then(|dev| dev.parse().ok())
                .unwrap_or(false),
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            config_file: std::env::var("REPOPULSE_CONFIG").ok(),
            pulse: None,
        }
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the analysis configuration: explicit value, then file, then defaults.
    /// Environment overrides and the database URL are applied last.
    pub fn load_pulse_config(&self) -> WebResult<PulseConfig> {
        let mut pulse = match (&self.pulse, &self.config_file) {
            (Some(pulse), _) => pulse.clone(),
            (None, Some(path)) => PulseConfig::from_file(path)?,
            (None, None) => PulseConfig::default(),
        };
        pulse.apply_env_overrides();
        if let Some(database_url) = &self.database_url {
            pulse.storage.database_url = Some(database_url.clone());
        }
        Ok(pulse)
    }
}

/// Error types for the web server
#[derive(thiserror::Error, Debug)]
pub enum WebError {
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] PulseError),

    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),

    #[error("Invalid path parameter: {0}")]
    Path(#[from] PathRejection),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, detail, error_code) = match &self {
            WebError::Analysis(analysis) => (
                StatusCode::from_u16(analysis.http_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                analysis.user_message(),
                analysis.kind().as_str(),
            ),
            WebError::Config(pulse) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                pulse.to_string(),
                pulse.kind().as_str(),
            ),
            WebError::Server(io) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                io.to_string(),
                "internal",
            ),
            WebError::Body(rejection) => (
                rejection.status(),
                rejection.body_text(),
                ErrorKind::Validation.as_str(),
            ),
            WebError::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                rejection.body_text(),
                ErrorKind::Validation.as_str(),
            ),
        };

        if status.is_server_error() {
            error!(status = status.as_u16(), error_code = error_code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            detail,
            error_code: error_code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for web operations
pub type WebResult<T> = Result<T, WebError>;

/// JSON body whose rejections use the `{detail, error_code}` error body
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(WebError))]
pub struct JsonBody<T>(pub T);

/// Path parameters whose rejections use the `{detail, error_code}` error body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(WebError))]
pub struct PathParams<T>(pub T);

/// Initialize logging for the web server
pub fn init_logging(level: &str, json: bool) -> anyhow::Result<()> {
    let base = if json {
        LoggingConfig::production()
    } else {
        LoggingConfig::default()
    };
    let mut config = base.with_level(level);
    config.filter_directives = ["repopulse_core", "repopulse_repo", "repopulse_engine", "repopulse_web"]
        .iter()
        .map(|target| format!("{}={}", target, level))
        .chain(std::iter::once("tower_http=debug".to_string()))
        .collect();

    repopulse_core::init_logging(&config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
