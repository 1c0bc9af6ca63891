//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request observations produce:
//!     → tracing.rs (one span per observed request)
//!     → metrics.rs (counters, gauges, histograms)
//! Every subsystem produces:
//!     → logging.rs (structured log events)
//!
//! Consumers:
//!     → Log aggregation (stdout, JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Span and metric handlers plug into the observation registry
//! - Either handler can be switched off in config

pub mod logging;
pub mod metrics;
pub mod tracing;
