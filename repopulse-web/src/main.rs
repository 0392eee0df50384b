//! RepoPulse Web Server

use clap::Parser;
use repopulse_web::server::RepoPulseServerBuilder;
use repopulse_web::{init_logging, WebConfig};
use tracing::{info, warn};

/// RepoPulse - GitHub repository analysis API
#[derive(Parser)]
#[command(name = "repopulse-web")]
#[command(about = "HTTP API for GitHub repository analysis")]
#[command(version)]
struct Args {
    /// Server host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode (any CORS origin)
    #[arg(long)]
    dev: bool,

    /// Database URL for analysis history
    #[arg(long)]
    database_url: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();

    init_logging(&args.log_level, args.json_logs)?;

    let mut config = WebConfig::from_env();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    config.dev_mode |= args.dev;
    if args.database_url.is_some() {
        config.database_url = args.database_url;
    }
    if args.config.is_some() {
        config.config_file = args.config;
    }

    if std::env::var("GITHUB_TOKEN").is_err() {
        warn!("GITHUB_TOKEN is not set, GitHub allows 60 unauthenticated requests per hour");
    }

    let server = RepoPulseServerBuilder::from_config(config).build().await?;
    server.start().await?;

    info!("Server shut down gracefully");
    Ok(())
}
