//! Request observation adapter.
//!
//! # Data Flow
//! ```text
//! request phase:   on_request_received
//!     → ReceiverContext built from the request head
//!     → Observation::start(convention, context, registry)
//!     → scope opened, holder stored on the exchange (skipped for no-ops)
//!
//! response phase:  on_response_ready
//!     → holder taken from the exchange (absent → nothing to do)
//!     → matched route + response head attached to the observation context
//!     → sync route: scope closed, observation stopped
//!     → suspended route: scope closed, AsyncCompletion left on the exchange
//! ```
//!
//! # Design Decisions
//! - The naming convention is fixed at construction, defaulting to the built-in one
//! - Handler failures propagate unchanged; nothing is retried
//! - Async detection is a lookup of the route's precomputed `suspended` flag

pub mod scoped;

use std::fmt;
use std::sync::Arc;

use crate::exchange::RequestContext;
use crate::observation::{
    DefaultReceiverConvention, Observation, ObservationError, ObservationRegistry,
    ReceiverContext, ReceiverConvention,
};

pub use scoped::{AsyncCompletion, ScopeHolder, ScopedObservations};

/// Starts an observation when a request arrives and stops it when the
/// response is ready.
#[derive(Clone)]
pub struct RequestObservationAdapter {
    registry: ObservationRegistry,
    convention: Arc<dyn ReceiverConvention>,
}

impl RequestObservationAdapter {
    /// Adapter using the built-in naming convention.
    pub fn new(registry: ObservationRegistry) -> Self {
        Self::with_convention(registry, None)
    }

    pub fn with_convention(
        registry: ObservationRegistry,
        convention: Option<Arc<dyn ReceiverConvention>>,
    ) -> Self {
        Self {
            registry,
            convention: convention.unwrap_or_else(|| Arc::new(DefaultReceiverConvention)),
        }
    }

    pub fn registry(&self) -> &ObservationRegistry {
        &self.registry
    }

    pub fn convention(&self) -> &Arc<dyn ReceiverConvention> {
        &self.convention
    }

    /// Request phase callback.
    pub fn on_request_received(&self, ctx: &mut RequestContext) -> Result<(), ObservationError> {
        let observation = Observation::start(
            self.convention.clone(),
            || ReceiverContext::new(ctx.request().clone()),
            &self.registry,
        )?;

        if let Some(holder) = self.start_scoped_observation(observation) {
            tracing::trace!(
                observation_id = ?holder.observation().id(),
                method = %ctx.request().method,
                path = %ctx.request().path(),
                "Request observation started"
            );
            ctx.set_observation(holder);
        }
        Ok(())
    }

    /// Response phase callback.
    pub fn on_response_ready(&self, ctx: &mut RequestContext) -> Result<(), ObservationError> {
        let holder = ctx.take_observation();
        if holder.is_none() {
            return Ok(());
        }

        let detach = self.is_async_response(ctx);
        let response = ctx.response().cloned();
        let route = ctx.matched_route().map(|r| r.template().to_string());

        let pending = self.stop_trace_span(holder, detach, move |context| {
            if let Some(route) = route {
                context.set_route(route);
            }
            if let Some(response) = response {
                context.set_response(response);
            }
        })?;

        if let Some(completion) = pending {
            ctx.set_async_completion(completion);
        }
        Ok(())
    }
}

impl ScopedObservations for RequestObservationAdapter {
    /// True if any parameter of the matched route is marked suspended.
    fn is_async_response(&self, ctx: &RequestContext) -> bool {
        ctx.matched_route()
            .map(|route| route.is_suspended())
            .unwrap_or(false)
    }
}

impl fmt::Debug for RequestObservationAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestObservationAdapter")
            .field("registry", &self.registry)
            .field("convention", &self.convention.name())
            .finish()
    }
}
