//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ratios within [0, 1], addresses parse)
//! - Detect duplicate or malformed routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::config::schema::{RouteConfig, ServiceConfig};
use crate::routing::ParamMarker;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid address `{value}` for {field}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("request timeout must be greater than zero")]
    ZeroTimeout,

    #[error("observation.sample_ratio must be within [0, 1], got {0}")]
    SampleRatioOutOfRange(f64),

    #[error("route #{index} has an empty name")]
    EmptyRouteName { index: usize },

    #[error("duplicate route name `{0}`")]
    DuplicateRouteName(String),

    #[error("route `{route}`: path `{path}` must start with '/'")]
    RelativePath { route: String, path: String },

    #[error("route `{route}`: catch-all segment must be last in `{path}`")]
    MisplacedCatchAll { route: String, path: String },

    #[error("route `{route}`: invalid method `{method}`")]
    InvalidMethod { route: String, method: String },

    #[error("route `{route}`: invalid status code {status}")]
    InvalidStatus { route: String, status: u16 },

    #[error("route `{route}`: more than one suspended parameter")]
    MultipleSuspendedParams { route: String },
}

pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }

    let ratio = config.observation.sample_ratio;
    if !(0.0..=1.0).contains(&ratio) {
        errors.push(ValidationError::SampleRatioOutOfRange(ratio));
    }

    let mut names = HashSet::new();
    for (index, route) in config.routes.iter().enumerate() {
        if route.name.is_empty() {
            errors.push(ValidationError::EmptyRouteName { index });
        } else if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRouteName(route.name.clone()));
        }
        validate_route(route, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, errors: &mut Vec<ValidationError>) {
    if !route.path.starts_with('/') {
        errors.push(ValidationError::RelativePath {
            route: route.name.clone(),
            path: route.path.clone(),
        });
    }

    let segments: Vec<&str> = route.path.split('/').filter(|s| !s.is_empty()).collect();
    if let Some(pos) = segments.iter().position(|s| s.starts_with("{*")) {
        if pos + 1 != segments.len() {
            errors.push(ValidationError::MisplacedCatchAll {
                route: route.name.clone(),
                path: route.path.clone(),
            });
        }
    }

    if let Some(method) = &route.method {
        if method.to_uppercase().parse::<Method>().is_err() {
            errors.push(ValidationError::InvalidMethod {
                route: route.name.clone(),
                method: method.clone(),
            });
        }
    }

    if route.status < 100 || StatusCode::from_u16(route.status).is_err() {
        errors.push(ValidationError::InvalidStatus {
            route: route.name.clone(),
            status: route.status,
        });
    }

    let suspended = route
        .params
        .iter()
        .filter(|p| p.markers.contains(&ParamMarker::Suspended))
        .count();
    if suspended > 1 {
        errors.push(ValidationError::MultipleSuspendedParams {
            route: route.name.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ParamConfig;

    fn route(name: &str, path: &str) -> RouteConfig {
        RouteConfig {
            name: name.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.observation.sample_ratio = -0.5;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroTimeout));
        assert!(errors.contains(&ValidationError::SampleRatioOutOfRange(-0.5)));
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_err());

        config.observability.metrics_enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_route_errors() {
        let mut bad_method = route("m", "/m");
        bad_method.method = Some("GE T".into());
        let mut bad_status = route("s", "/s");
        bad_status.status = 42;
        let mut two_suspended = route("t", "/t");
        two_suspended.params = vec![
            ParamConfig {
                name: "a".into(),
                markers: vec![ParamMarker::Suspended],
            },
            ParamConfig {
                name: "b".into(),
                markers: vec![ParamMarker::Suspended],
            },
        ];

        let config = ServiceConfig {
            routes: vec![
                route("dup", "/a"),
                route("dup", "/b"),
                route("rel", "relative"),
                route("catch", "/files/{*rest}/more"),
                bad_method,
                bad_status,
                two_suspended,
            ],
            ..Default::default()
        };

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::DuplicateRouteName("dup".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MisplacedCatchAll { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::MultipleSuspendedParams { .. })));
    }
}
