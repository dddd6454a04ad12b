//! OpsIntel Daemon - Operations intelligence service
//!
//! The daemon provides:
//! - Telemetry ingress with rolling z-score anomaly detection
//! - Remediation workflows driven over REST
//! - A hash-linked decision ledger
//! - Live event streaming (SSE) with history replay

use clap::Parser;
use opsintel_daemon::config::DaemonConfig;
use opsintel_daemon::error::{DaemonError, DaemonResult};
use opsintel_daemon::server::Server;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// OpsIntel Daemon CLI
#[derive(Parser)]
#[command(name = "opsinteld")]
#[command(about = "OpsIntel Daemon - Operations intelligence pipeline", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "OPSINTEL_CONFIG")]
    config: Option<String>,

    /// Listen address (overrides the config file)
    #[arg(short, long, env = "OPSINTEL_LISTEN_ADDR")]
    listen: Option<String>,

    /// Log level (overrides the config file)
    #[arg(long, env = "OPSINTEL_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "OPSINTEL_LOG_JSON")]
    json: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())?;

    // Override with CLI args
    if let Some(listen) = &cli.listen {
        config.server.listen_addr = listen
            .parse()
            .map_err(|e| DaemonError::Config(format!("Invalid listen address: {}", e)))?;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.server.listen_addr,
        prediction_interval_secs = config.scheduler.prediction_interval_secs,
        "Starting OpsIntel daemon"
    );

    // Create and run server
    let server = Server::new(config)?;
    server.run().await
}
