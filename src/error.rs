//! Top-level error type for starting and running the service.

use std::net::AddrParseError;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),

    #[error("Failed to install metrics exporter: {0}")]
    Metrics(#[from] BuildError),

    #[error("Invalid address: {0}")]
    Address(#[from] AddrParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    #[test]
    fn test_startup_failures_convert() {
        let err: Error = "not-an-address".parse::<SocketAddr>().unwrap_err().into();
        assert!(matches!(err, Error::Address(_)));
        assert!(err.to_string().starts_with("Invalid address"));

        let err: Error = std::io::Error::other("bind refused").into();
        assert_eq!(err.to_string(), "IO error: bind refused");
    }
}
