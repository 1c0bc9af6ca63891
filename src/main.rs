//! request-observer
//!
//! Serves the configured routes and observes every exchange.
//!
//! ```text
//!   Client ──▶ request id ──▶ observation layer ──▶ timeout ──▶ route handler
//!                                   │
//!                                   ▼
//!                      observation registry handlers
//!                       (tracing span, Prometheus metrics)
//! ```

use std::path::PathBuf;

use clap::Parser;

use request_observer::config::{load_config, ServiceConfig};
use request_observer::lifecycle::startup;
use request_observer::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "request-observer")]
#[command(about = "HTTP service with per-request observation", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        "request-observer starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
