//! Scoped observation lifecycle shared by request interceptors.
//!
//! # States
//! ```text
//! start_scoped_observation:  NEW → OBSERVING            (holder stored)
//! stop_trace_span, sync:     OBSERVING → CLOSED          (scope closed, stopped)
//! stop_trace_span, detached: OBSERVING → PENDING         (scope closed only)
//! AsyncCompletion:           PENDING → CLOSED            (complete / fail / drop)
//! ```
//!
//! # Design Decisions
//! - Holders and completions are owned, non-clone tokens: one stop per exchange
//! - Dropping an unfinished token stops the observation with an `abandoned`
//!   error, so aborted exchanges never leak an open observation

use std::fmt;

use crate::exchange::RequestContext;
use crate::observation::{Observation, ObservationError, ObservationScope, ReceiverContext};

const ABANDONED: &str = "abandoned";

/// Active observation scope stored on an exchange.
pub struct ScopeHolder {
    observation: Observation,
    scope: Option<ObservationScope>,
}

impl ScopeHolder {
    fn new(scope: ObservationScope) -> Self {
        Self {
            observation: scope.observation().clone(),
            scope: Some(scope),
        }
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    fn release(mut self) -> (Observation, Option<ObservationScope>) {
        let scope = self.scope.take();
        (self.observation.clone(), scope)
    }
}

impl fmt::Debug for ScopeHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHolder")
            .field("observation", &self.observation)
            .field("open", &self.scope.is_some())
            .finish()
    }
}

impl Drop for ScopeHolder {
    fn drop(&mut self) {
        if let Some(scope) = self.scope.take() {
            scope.close();
            abandon(&self.observation, "exchange ended before the response was ready");
        }
    }
}

/// Detached observation awaiting the asynchronous completion of its exchange.
pub struct AsyncCompletion {
    observation: Option<Observation>,
}

impl AsyncCompletion {
    fn new(observation: Observation) -> Self {
        Self {
            observation: Some(observation),
        }
    }

    pub fn observation(&self) -> Option<&Observation> {
        self.observation.as_ref()
    }

    /// The asynchronous handler finished; stop the observation.
    pub fn complete(mut self) -> Result<(), ObservationError> {
        match self.observation.take() {
            Some(observation) => observation.stop(),
            None => Ok(()),
        }
    }

    /// The asynchronous handler failed; record the error and stop.
    pub fn fail(
        mut self,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), ObservationError> {
        match self.observation.take() {
            Some(observation) => {
                observation.error(kind, message);
                observation.stop()
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for AsyncCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCompletion")
            .field("observation", &self.observation)
            .finish()
    }
}

impl Drop for AsyncCompletion {
    fn drop(&mut self) {
        if let Some(observation) = self.observation.take() {
            abandon(&observation, "asynchronous response was never completed");
        }
    }
}

fn abandon(observation: &Observation, reason: &str) {
    tracing::debug!(
        observation_id = ?observation.id(),
        reason,
        "Finalizing abandoned observation"
    );
    observation.error(ABANDONED, reason);
    if let Err(e) = observation.stop() {
        tracing::warn!(error = %e, "Failed to stop abandoned observation");
    }
}

/// Start/stop helpers for interceptors that keep an observation open across
/// the request and response phase of an exchange.
pub trait ScopedObservations {
    /// Whether the exchange completes asynchronously, after the response
    /// phase has already run.
    fn is_async_response(&self, ctx: &RequestContext) -> bool;

    /// Open a scope on a started observation. No-op observations yield no
    /// holder, so nothing is stored on the exchange.
    fn start_scoped_observation(&self, observation: Observation) -> Option<ScopeHolder> {
        if observation.is_noop() {
            return None;
        }
        Some(ScopeHolder::new(observation.open_scope()))
    }

    /// Close the scope of `holder`, run `on_stop` against the observation
    /// context, then either stop the observation or, when `detach` is set,
    /// hand it back as an [`AsyncCompletion`].
    fn stop_trace_span<F>(
        &self,
        holder: Option<ScopeHolder>,
        detach: bool,
        on_stop: F,
    ) -> Result<Option<AsyncCompletion>, ObservationError>
    where
        F: FnOnce(&mut ReceiverContext),
    {
        let Some(holder) = holder else {
            return Ok(None);
        };

        let (observation, scope) = holder.release();
        observation.with_context(on_stop);
        if let Some(scope) = scope {
            scope.close();
        }

        if detach {
            tracing::trace!(
                observation_id = ?observation.id(),
                "Observation detached until asynchronous completion"
            );
            return Ok(Some(AsyncCompletion::new(observation)));
        }

        observation.stop()?;
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::RequestHead;
    use crate::observation::handler::recording::{Event, RecordingHandler};
    use crate::observation::{DefaultReceiverConvention, ObservationRegistry};
    use axum::http::{Method, Uri};
    use std::sync::Arc;

    struct Fixed(bool);

    impl ScopedObservations for Fixed {
        fn is_async_response(&self, _ctx: &RequestContext) -> bool {
            self.0
        }
    }

    fn start(handler: &RecordingHandler) -> Observation {
        let registry = ObservationRegistry::builder().handler(handler.clone()).build();
        Observation::start(
            Arc::new(DefaultReceiverConvention),
            || ReceiverContext::new(RequestHead::new(Method::GET, Uri::from_static("/"))),
            &registry,
        )
        .unwrap()
    }

    #[test]
    fn test_noop_observation_yields_no_holder() {
        assert!(Fixed(false)
            .start_scoped_observation(Observation::noop())
            .is_none());
    }

    #[test]
    fn test_missing_holder_is_noop() {
        let called = std::cell::Cell::new(false);
        let pending = Fixed(false)
            .stop_trace_span(None, false, |_| called.set(true))
            .unwrap();
        assert!(pending.is_none());
        assert!(!called.get());
    }

    #[test]
    fn test_sync_stop() {
        let handler = RecordingHandler::default();
        let observation = start(&handler);
        let holder = Fixed(false).start_scoped_observation(observation.clone());

        let pending = Fixed(false)
            .stop_trace_span(holder, false, |ctx| ctx.set_route("/x"))
            .unwrap();

        assert!(pending.is_none());
        assert!(observation.is_stopped());
        assert_eq!(handler.stops()[0].route.as_deref(), Some("/x"));
    }

    #[test]
    fn test_detached_stop_defers_completion() {
        let handler = RecordingHandler::default();
        let observation = start(&handler);
        let holder = Fixed(true).start_scoped_observation(observation.clone());

        let pending = Fixed(true)
            .stop_trace_span(holder, true, |_| {})
            .unwrap()
            .expect("detached observation");

        assert_eq!(handler.count(Event::ScopeClosed), 1);
        assert!(!observation.is_stopped());

        pending.complete().unwrap();
        assert!(observation.is_stopped());
        assert_eq!(handler.count(Event::Stop), 1);
    }

    #[test]
    fn test_failed_completion_records_error() {
        let handler = RecordingHandler::default();
        let holder = Fixed(true).start_scoped_observation(start(&handler));
        let pending = Fixed(true).stop_trace_span(holder, true, |_| {}).unwrap().unwrap();

        pending.fail("body_stream", "connection reset").unwrap();
        assert_eq!(handler.stops()[0].error_kind.as_deref(), Some("body_stream"));
    }

    #[test]
    fn test_dropped_holder_is_abandoned() {
        let handler = RecordingHandler::default();
        let observation = start(&handler);
        drop(Fixed(false).start_scoped_observation(observation.clone()));

        assert!(observation.is_stopped());
        assert_eq!(handler.count(Event::ScopeClosed), 1);
        assert_eq!(handler.stops()[0].error_kind.as_deref(), Some("abandoned"));
    }

    #[test]
    fn test_dropped_completion_is_abandoned() {
        let handler = RecordingHandler::default();
        let observation = start(&handler);
        let holder = Fixed(true).start_scoped_observation(observation.clone());
        drop(Fixed(true).stop_trace_span(holder, true, |_| {}).unwrap());

        assert!(observation.is_stopped());
        assert_eq!(handler.stops()[0].error_kind.as_deref(), Some("abandoned"));
    }
}
