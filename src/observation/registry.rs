//! Observation registry and start predicates.
//!
//! # Responsibilities
//! - Hold the ordered handler list shared by every observation
//! - Decide whether an observation is recorded at all (predicates, sampling)
//!
//! # Design Decisions
//! - Immutable after build, shared via `Arc`; no locking on the hot path
//! - A registry without handlers is a no-op registry: starts never allocate

use std::fmt;
use std::sync::Arc;

use crate::config::ObservationConfig;
use crate::observability::metrics::MetricsHandler;
use crate::observability::tracing::TracingHandler;
use crate::observation::context::ReceiverContext;
use crate::observation::handler::ObservationHandler;

/// Decides whether an observation should be recorded.
pub trait ObservationPredicate: Send + Sync {
    fn test(&self, name: &str, ctx: &ReceiverContext) -> bool;
}

impl<F> ObservationPredicate for F
where
    F: Fn(&str, &ReceiverContext) -> bool + Send + Sync,
{
    fn test(&self, name: &str, ctx: &ReceiverContext) -> bool {
        self(name, ctx)
    }
}

/// Probabilistic sampling: records roughly `ratio` of all observations.
#[derive(Debug, Clone, Copy)]
pub struct SamplingPredicate {
    ratio: f64,
}

impl SamplingPredicate {
    /// The ratio is clamped into `[0, 1]`.
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio: ratio.clamp(0.0, 1.0),
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl ObservationPredicate for SamplingPredicate {
    fn test(&self, _name: &str, _ctx: &ReceiverContext) -> bool {
        if self.ratio >= 1.0 {
            return true;
        }
        if self.ratio <= 0.0 {
            return false;
        }
        rand::random::<f64>() < self.ratio
    }
}

/// Skips requests whose path starts with one of the given prefixes.
#[derive(Debug, Clone)]
pub struct PathExclusionPredicate {
    prefixes: Vec<String>,
}

impl PathExclusionPredicate {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl ObservationPredicate for PathExclusionPredicate {
    fn test(&self, _name: &str, ctx: &ReceiverContext) -> bool {
        let path = ctx.request().path();
        !self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

struct RegistryInner {
    handlers: Vec<Arc<dyn ObservationHandler>>,
    predicates: Vec<Arc<dyn ObservationPredicate>>,
}

/// Process-wide observation registry.
#[derive(Clone, Default)]
pub struct ObservationRegistry {
    inner: Option<Arc<RegistryInner>>,
}

impl ObservationRegistry {
    pub fn builder() -> ObservationRegistryBuilder {
        ObservationRegistryBuilder::default()
    }

    /// Registry on which every start is a no-op.
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// Build the registry described by the `[observation]` config section.
    pub fn from_config(config: &ObservationConfig) -> Self {
        if !config.enabled {
            tracing::info!("Request observation disabled");
            return Self::noop();
        }

        let mut builder = Self::builder();
        if config.tracing {
            builder = builder.handler(TracingHandler::new());
        }
        if config.metrics {
            builder = builder.handler(MetricsHandler::new());
        }
        if config.sample_ratio < 1.0 {
            builder = builder.predicate(SamplingPredicate::new(config.sample_ratio));
        }
        if !config.excluded_paths.is_empty() {
            builder = builder.predicate(PathExclusionPredicate::new(config.excluded_paths.clone()));
        }

        let registry = builder.build();
        tracing::info!(
            handlers = registry.handlers().len(),
            sample_ratio = config.sample_ratio,
            excluded_paths = ?config.excluded_paths,
            "Observation registry ready"
        );
        registry
    }

    /// True when no observation will ever be recorded.
    pub fn is_noop(&self) -> bool {
        self.inner
            .as_ref()
            .map(|inner| inner.handlers.is_empty())
            .unwrap_or(true)
    }

    pub fn handlers(&self) -> &[Arc<dyn ObservationHandler>] {
        self.inner
            .as_ref()
            .map(|inner| inner.handlers.as_slice())
            .unwrap_or(&[])
    }

    /// All predicates must agree for the observation to be recorded.
    pub fn observation_enabled(&self, name: &str, ctx: &ReceiverContext) -> bool {
        match &self.inner {
            Some(inner) => inner.predicates.iter().all(|p| p.test(name, ctx)),
            None => false,
        }
    }
}

impl fmt::Debug for ObservationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers: Vec<&'static str> = self.handlers().iter().map(|h| h.name()).collect();
        f.debug_struct("ObservationRegistry")
            .field("handlers", &handlers)
            .field(
                "predicates",
                &self.inner.as_ref().map(|i| i.predicates.len()).unwrap_or(0),
            )
            .finish()
    }
}

#[derive(Default)]
pub struct ObservationRegistryBuilder {
    handlers: Vec<Arc<dyn ObservationHandler>>,
    predicates: Vec<Arc<dyn ObservationPredicate>>,
}

impl ObservationRegistryBuilder {
    pub fn handler(mut self, handler: impl ObservationHandler + 'static) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    pub fn predicate(mut self, predicate: impl ObservationPredicate + 'static) -> Self {
        self.predicates.push(Arc::new(predicate));
        self
    }

    pub fn build(self) -> ObservationRegistry {
        ObservationRegistry {
            inner: Some(Arc::new(RegistryInner {
                handlers: self.handlers,
                predicates: self.predicates,
            })),
        }
    }
}
