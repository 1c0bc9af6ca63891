//! Naming and tagging conventions for request observations.
//!
//! A convention decides the observation name, the contextual (span) name and
//! the key values. Key values are computed at stop time, when the response
//! and the matched route are known.

use axum::http::StatusCode;

use crate::observation::context::{KeyValues, ReceiverContext};

/// Default observation name for inbound requests.
pub const REQUEST_OBSERVATION_NAME: &str = "http.server.requests";

const UNKNOWN: &str = "UNKNOWN";

/// Pluggable naming/tagging convention.
pub trait ReceiverConvention: Send + Sync {
    fn name(&self) -> &str;

    fn contextual_name(&self, ctx: &ReceiverContext) -> String;

    fn low_cardinality_key_values(&self, ctx: &ReceiverContext) -> KeyValues;

    fn high_cardinality_key_values(&self, ctx: &ReceiverContext) -> KeyValues;
}

/// Built-in convention used when no custom one is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReceiverConvention;

impl DefaultReceiverConvention {
    fn method(ctx: &ReceiverContext) -> String {
        ctx.request().method.as_str().to_string()
    }

    fn status(ctx: &ReceiverContext) -> String {
        ctx.response()
            .map(|r| r.status.as_u16().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    fn uri(ctx: &ReceiverContext) -> String {
        if let Some(route) = ctx.route() {
            return route.to_string();
        }
        if let Some(response) = ctx.response() {
            if response.status.is_redirection() {
                return "REDIRECTION".to_string();
            }
            if response.status == StatusCode::NOT_FOUND {
                return "NOT_FOUND".to_string();
            }
        }
        let path = ctx.request().path();
        if path.is_empty() || path == "/" {
            "root".to_string()
        } else {
            UNKNOWN.to_string()
        }
    }

    fn exception(ctx: &ReceiverContext) -> String {
        ctx.error()
            .map(|e| e.kind.clone())
            .unwrap_or_else(|| "none".to_string())
    }
}

impl ReceiverConvention for DefaultReceiverConvention {
    fn name(&self) -> &str {
        REQUEST_OBSERVATION_NAME
    }

    fn contextual_name(&self, ctx: &ReceiverContext) -> String {
        format!("HTTP {}", ctx.request().method)
    }

    fn low_cardinality_key_values(&self, ctx: &ReceiverContext) -> KeyValues {
        KeyValues::empty()
            .and("method", Self::method(ctx))
            .and("uri", Self::uri(ctx))
            .and("status", Self::status(ctx))
            .and("outcome", outcome(ctx.response().map(|r| r.status)))
            .and("exception", Self::exception(ctx))
    }

    fn high_cardinality_key_values(&self, ctx: &ReceiverContext) -> KeyValues {
        KeyValues::empty().and("http.url", ctx.request().uri.to_string())
    }
}

/// Classify a status code into its outcome family.
pub fn outcome(status: Option<StatusCode>) -> &'static str {
    match status.map(|s| s.as_u16()) {
        Some(100..=199) => "INFORMATIONAL",
        Some(200..=299) => "SUCCESS",
        Some(300..=399) => "REDIRECTION",
        Some(400..=499) => "CLIENT_ERROR",
        Some(500..=599) => "SERVER_ERROR",
        _ => UNKNOWN,
    }
}
