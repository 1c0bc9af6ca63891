//! Observation lifecycle handlers.
//!
//! Handlers turn observation events into signals (spans, metrics, ...).
//! Start and scope-open run in registration order; scope-close and stop run
//! in reverse order so nested handlers unwind symmetrically.
//!
//! When a handler fails to start, every handler whose `on_start` succeeded
//! gets `on_stop` (in reverse) with error kind `start_failed`. A handler that
//! failed to start never sees a stop.
//!
//! Handlers are called while the observation context is locked and must not
//! call back into the observation they are handling.

use crate::observation::context::ReceiverContext;

/// Failure reported by a handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub trait ObservationHandler: Send + Sync {
    /// Short name used in error reports and logs.
    fn name(&self) -> &'static str;

    fn on_start(&self, _ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        Ok(())
    }

    fn on_scope_opened(&self, _ctx: &ReceiverContext) {}

    fn on_scope_closed(&self, _ctx: &ReceiverContext) {}

    fn on_error(&self, _ctx: &ReceiverContext) {}

    fn on_stop(&self, _ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod recording {
    //! Handler double recording every lifecycle event it sees.

    use std::sync::{Arc, Mutex};

    use axum::http::StatusCode;

    use super::*;
    use crate::observation::ObservationId;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Event {
        Start,
        ScopeOpened,
        ScopeClosed,
        Error,
        Stop,
    }

    /// Snapshot of the context taken when `on_stop` ran.
    #[derive(Debug, Clone)]
    pub struct StopRecord {
        pub id: ObservationId,
        pub status: Option<StatusCode>,
        pub route: Option<String>,
        pub error_kind: Option<String>,
    }

    #[derive(Clone, Default)]
    pub struct RecordingHandler {
        pub events: Arc<Mutex<Vec<(Event, ObservationId)>>>,
        pub stops: Arc<Mutex<Vec<StopRecord>>>,
        pub fail_start: bool,
        pub fail_stop: bool,
    }

    impl RecordingHandler {
        pub fn events(&self) -> Vec<(Event, ObservationId)> {
            self.events.lock().unwrap().clone()
        }

        pub fn stops(&self) -> Vec<StopRecord> {
            self.stops.lock().unwrap().clone()
        }

        pub fn count(&self, event: Event) -> usize {
            self.events().iter().filter(|(e, _)| *e == event).count()
        }

        fn record(&self, event: Event, ctx: &ReceiverContext) {
            let id = ctx.id().expect("handler saw context without id");
            self.events.lock().unwrap().push((event, id));
        }
    }

    impl ObservationHandler for RecordingHandler {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn on_start(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
            self.record(Event::Start, ctx);
            if self.fail_start {
                return Err(HandlerError::new("start rejected"));
            }
            Ok(())
        }

        fn on_scope_opened(&self, ctx: &ReceiverContext) {
            self.record(Event::ScopeOpened, ctx);
        }

        fn on_scope_closed(&self, ctx: &ReceiverContext) {
            self.record(Event::ScopeClosed, ctx);
        }

        fn on_error(&self, ctx: &ReceiverContext) {
            self.record(Event::Error, ctx);
        }

        fn on_stop(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
            self.record(Event::Stop, ctx);
            self.stops.lock().unwrap().push(StopRecord {
                id: ctx.id().expect("handler saw context without id"),
                status: ctx.response().map(|r| r.status),
                route: ctx.route().map(str::to_string),
                error_kind: ctx.error().map(|e| e.kind.clone()),
            });
            if self.fail_stop {
                return Err(HandlerError::new("stop rejected"));
            }
            Ok(())
        }
    }
}
