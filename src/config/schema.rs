//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::routing::ParamMarker;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request observation settings.
    pub observation: ObservationConfig,

    /// Logging and metrics exposition.
    pub observability: ObservabilityConfig,

    /// Served routes.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request observation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservationConfig {
    /// Master switch; when off the registry is a no-op.
    pub enabled: bool,

    /// Fraction of requests observed, in [0, 1].
    pub sample_ratio: f64,

    /// Emit a tracing span per observation.
    pub tracing: bool,

    /// Record request metrics per observation.
    pub metrics: bool,

    /// Path prefixes that are never observed (e.g. health probes).
    pub excluded_paths: Vec<String>,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_ratio: 1.0,
            tracing: true,
            metrics: true,
            excluded_paths: Vec::new(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// A served route and its canned response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path template, e.g. "/orders/{id}".
    pub path: String,

    /// HTTP method to match; any method when absent.
    pub method: Option<String>,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Route priority (higher = checked first).
    pub priority: u32,

    /// Endpoint parameters and their markers.
    pub params: Vec<ParamConfig>,

    /// Response status code.
    pub status: u16,

    /// Response body.
    pub body: String,

    /// Delay before the response (or, for suspended routes, its body) completes.
    pub delay_ms: u64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: "/".to_string(),
            method: None,
            host: None,
            priority: 0,
            params: Vec::new(),
            status: 200,
            body: String::new(),
            delay_ms: 0,
        }
    }
}

/// Endpoint parameter description.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParamConfig {
    pub name: String,

    #[serde(default)]
    pub markers: Vec<ParamMarker>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ServiceConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.observation.enabled);
        assert_eq!(config.observation.sample_ratio, 1.0);
        assert!(config.routes.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:3000"

            [observation]
            sample_ratio = 0.25
            excluded_paths = ["/health"]

            [observability]
            json_logs = true
            metrics_enabled = false

            [[routes]]
            name = "order-events"
            path = "/orders/{id}/events"
            method = "GET"
            delay_ms = 50
            body = "done"

            [[routes.params]]
            name = "id"
            markers = ["path"]

            [[routes.params]]
            name = "response"
            markers = ["suspended"]
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:3000");
        assert_eq!(config.observation.sample_ratio, 0.25);
        assert!(config.observation.tracing);
        assert!(config.observability.json_logs);
        assert!(!config.observability.metrics_enabled);

        let route = &config.routes[0];
        assert_eq!(route.status, 200);
        assert_eq!(route.delay_ms, 50);
        assert_eq!(route.params[1].markers, vec![ParamMarker::Suspended]);
    }
}
