//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics::init_metrics;
use crate::observation::ObservationRegistry;

/// Start every subsystem and serve until a termination signal.
///
/// Logging must already be initialized.
pub async fn run(config: ServiceConfig) -> Result<()> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        init_metrics(addr)?;
    }

    let registry = ObservationRegistry::from_config(&config.observation);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        request_timeout_secs = config.timeouts.request_secs,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    HttpServer::new(config, registry).run(listener, stop).await?;
    Ok(())
}
