//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Translate observations into request metrics
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `http_server_requests_total` (counter): observed requests by low-cardinality tags
//! - `http_server_requests_seconds` (histogram): latency distribution
//! - `http_server_requests_active` (gauge): observations currently running
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Labels are the convention's low-cardinality key values only
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;

use metrics::Label;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::observation::{HandlerError, ObservationHandler, ReceiverContext};

pub const REQUESTS_TOTAL: &str = "http_server_requests_total";
pub const REQUEST_DURATION: &str = "http_server_requests_seconds";
pub const REQUESTS_ACTIVE: &str = "http_server_requests_active";

const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the global Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)?
        .install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsHandler;

impl MetricsHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ObservationHandler for MetricsHandler {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn on_start(&self, _ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        metrics::gauge!(REQUESTS_ACTIVE).increment(1.0);
        Ok(())
    }

    fn on_stop(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        metrics::gauge!(REQUESTS_ACTIVE).decrement(1.0);

        let labels: Vec<Label> = ctx
            .low_cardinality_key_values()
            .iter()
            .map(|kv| Label::new(kv.key, kv.value.clone()))
            .collect();
        let seconds = ctx.duration().map(|d| d.as_secs_f64()).unwrap_or_default();

        metrics::counter!(REQUESTS_TOTAL, labels.clone()).increment(1);
        metrics::histogram!(REQUEST_DURATION, labels).record(seconds);
        Ok(())
    }
}
