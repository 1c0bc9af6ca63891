//! Observation handle and scope.
//!
//! # Lifecycle
//! ```text
//! start ──► open_scope ──► scope.close ──► stop
//!              (0..n)                       (once; later calls are no-ops)
//! ```
//!
//! A no-op observation carries no state: the registry declined to record it
//! (no handlers, disabled, or a predicate such as sampling said no).

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::observation::context::{ObservationId, ReceiverContext};
use crate::observation::convention::ReceiverConvention;
use crate::observation::handler::HandlerError;
use crate::observation::registry::ObservationRegistry;

/// Lifecycle phase in which a handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => f.write_str("start"),
            Phase::Stop => f.write_str("stop"),
        }
    }
}

/// Error raised while starting or stopping an observation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObservationError {
    #[error("observation handler `{handler}` failed on {phase}: {source}")]
    Handler {
        handler: &'static str,
        phase: Phase,
        #[source]
        source: HandlerError,
    },
}

struct ObservationState {
    id: ObservationId,
    registry: ObservationRegistry,
    convention: Arc<dyn ReceiverConvention>,
    context: Mutex<ReceiverContext>,
    started_at: Instant,
    stopped: AtomicBool,
}

impl ObservationState {
    fn context(&self) -> MutexGuard<'_, ReceiverContext> {
        self.context.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to an in-progress observation. Clones share the same observation.
#[derive(Clone, Default)]
pub struct Observation {
    state: Option<Arc<ObservationState>>,
}

impl Observation {
    /// Observation that records nothing.
    pub fn noop() -> Self {
        Self { state: None }
    }

    /// Create and start an observation.
    ///
    /// The context supplier is only invoked when the registry is able to
    /// record; a no-op registry returns a no-op observation straight away.
    /// Handlers run in registration order; every handler runs even if an
    /// earlier one failed, and the first failure is returned.
    pub fn start<F>(
        convention: Arc<dyn ReceiverConvention>,
        context: F,
        registry: &ObservationRegistry,
    ) -> Result<Self, ObservationError>
    where
        F: FnOnce() -> ReceiverContext,
    {
        if registry.is_noop() {
            return Ok(Self::noop());
        }

        let mut ctx = context();
        ctx.set_name(convention.name());
        let contextual_name = convention.contextual_name(&ctx);
        ctx.set_contextual_name(contextual_name);

        if !registry.observation_enabled(convention.name(), &ctx) {
            tracing::trace!(
                name = %ctx.name(),
                path = %ctx.request().path(),
                "Observation skipped by predicate"
            );
            return Ok(Self::noop());
        }

        let id = ObservationId::next();
        ctx.set_id(id);

        let mut first_error = None;
        let mut started = Vec::with_capacity(registry.handlers().len());
        for handler in registry.handlers() {
            match handler.on_start(&mut ctx) {
                Ok(()) => started.push(handler),
                Err(source) => {
                    first_error.get_or_insert(ObservationError::Handler {
                        handler: handler.name(),
                        phase: Phase::Start,
                        source,
                    });
                }
            }
        }

        if let Some(err) = &first_error {
            // Handlers that did start still get their stop, in reverse.
            ctx.set_error("start_failed", err.to_string());
            ctx.set_duration(Duration::ZERO);
            let low = convention.low_cardinality_key_values(&ctx);
            let high = convention.high_cardinality_key_values(&ctx);
            ctx.add_low_cardinality_key_values(low);
            ctx.add_high_cardinality_key_values(high);
            for handler in started.into_iter().rev() {
                if let Err(source) = handler.on_stop(&mut ctx) {
                    tracing::warn!(
                        handler = handler.name(),
                        error = %source,
                        "Handler failed to unwind a failed start"
                    );
                }
            }
        }

        let observation = Self {
            state: Some(Arc::new(ObservationState {
                id,
                registry: registry.clone(),
                convention,
                context: Mutex::new(ctx),
                started_at: Instant::now(),
                stopped: AtomicBool::new(false),
            })),
        };

        match first_error {
            Some(err) => {
                observation.mark_stopped();
                Err(err)
            }
            None => Ok(observation),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.state.is_none()
    }

    pub fn id(&self) -> Option<ObservationId> {
        self.state.as_ref().map(|s| s.id)
    }

    /// True once `stop` has run. No-op observations count as stopped.
    pub fn is_stopped(&self) -> bool {
        self.state
            .as_ref()
            .map(|s| s.stopped.load(Ordering::Acquire))
            .unwrap_or(true)
    }

    /// Time from start to stop; `None` while still running.
    pub fn duration(&self) -> Option<Duration> {
        self.state.as_ref().and_then(|s| s.context().duration())
    }

    /// Same observation, compared by identity.
    pub fn same_as(&self, other: &Observation) -> bool {
        match (&self.state, &other.state) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Run `f` against the observation context. Returns `None` for no-ops.
    pub fn with_context<R>(&self, f: impl FnOnce(&mut ReceiverContext) -> R) -> Option<R> {
        self.state.as_ref().map(|s| f(&mut s.context()))
    }

    pub fn open_scope(&self) -> ObservationScope {
        if let Some(state) = &self.state {
            let ctx = state.context();
            for handler in state.registry.handlers() {
                handler.on_scope_opened(&ctx);
            }
        }
        ObservationScope {
            observation: self.clone(),
            closed: false,
        }
    }

    /// Record an error against the observation; it is reported on stop.
    pub fn error(&self, kind: impl Into<String>, message: impl Into<String>) {
        if let Some(state) = &self.state {
            let mut ctx = state.context();
            ctx.set_error(kind, message);
            for handler in state.registry.handlers() {
                handler.on_error(&ctx);
            }
        }
    }

    /// Stop the observation: compute key values, then run stop handlers in
    /// reverse order. Only the first call has any effect.
    pub fn stop(&self) -> Result<(), ObservationError> {
        let Some(state) = &self.state else {
            return Ok(());
        };
        if state.stopped.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut ctx = state.context();
        ctx.set_duration(state.started_at.elapsed());
        let low = state.convention.low_cardinality_key_values(&ctx);
        let high = state.convention.high_cardinality_key_values(&ctx);
        ctx.add_low_cardinality_key_values(low);
        ctx.add_high_cardinality_key_values(high);

        let mut first_error = None;
        for handler in state.registry.handlers().iter().rev() {
            if let Err(source) = handler.on_stop(&mut ctx) {
                first_error.get_or_insert(ObservationError::Handler {
                    handler: handler.name(),
                    phase: Phase::Stop,
                    source,
                });
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn mark_stopped(&self) {
        if let Some(state) = &self.state {
            state.stopped.store(true, Ordering::Release);
        }
    }

    fn close_scope(&self) {
        if let Some(state) = &self.state {
            let ctx = state.context();
            for handler in state.registry.handlers().iter().rev() {
                handler.on_scope_closed(&ctx);
            }
        }
    }
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            Some(state) => f
                .debug_struct("Observation")
                .field("id", &state.id)
                .field("stopped", &state.stopped.load(Ordering::Relaxed))
                .finish(),
            None => f.write_str("Observation(noop)"),
        }
    }
}

/// An opened scope. Closing it does not stop the observation.
#[derive(Debug)]
pub struct ObservationScope {
    observation: Observation,
    closed: bool,
}

impl ObservationScope {
    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn close(mut self) {
        self.close_once();
    }

    fn close_once(&mut self) {
        if !self.closed {
            self.closed = true;
            self.observation.close_scope();
        }
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        self.close_once();
    }
}
