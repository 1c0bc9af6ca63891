//! Span-per-request observation handler.
//!
//! # Responsibilities
//! - Create a `tracing` span when an observation starts
//! - Record route, status and outcome on the span when it stops
//! - Expose the span so the pipeline can instrument the inner service
//!
//! # Design Decisions
//! - Field names follow OpenTelemetry HTTP semantic conventions
//! - The span is dropped on stop; it closes once the last clone is gone

use ::tracing::{field, Span};

use crate::observation::{HandlerError, Observation, ObservationHandler, ReceiverContext};

#[derive(Clone)]
struct ObservationSpan(Span);

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

impl TracingHandler {
    pub fn new() -> Self {
        Self
    }
}

fn span_of(ctx: &ReceiverContext) -> Option<&Span> {
    ctx.extensions().get::<ObservationSpan>().map(|s| &s.0)
}

/// Span of a running observation; `Span::none()` if it has none.
pub fn observation_span(observation: &Observation) -> Span {
    observation
        .with_context(|ctx| span_of(ctx).cloned())
        .flatten()
        .unwrap_or_else(Span::none)
}

impl ObservationHandler for TracingHandler {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn on_start(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        let span = ::tracing::info_span!(
            "http.server.request",
            otel.name = %ctx.contextual_name(),
            otel.kind = "server",
            observation.id = ctx.id().map(|id| id.as_u64()).unwrap_or_default(),
            http.request.method = %ctx.request().method,
            url.path = %ctx.request().path(),
            http.route = field::Empty,
            http.response.status_code = field::Empty,
            outcome = field::Empty,
            error = field::Empty,
        );
        ctx.extensions_mut().insert(ObservationSpan(span));
        Ok(())
    }

    fn on_scope_opened(&self, ctx: &ReceiverContext) {
        if let Some(span) = span_of(ctx) {
            ::tracing::trace!(parent: span, "Observation scope opened");
        }
    }

    fn on_scope_closed(&self, ctx: &ReceiverContext) {
        if let Some(span) = span_of(ctx) {
            ::tracing::trace!(parent: span, "Observation scope closed");
        }
    }

    fn on_error(&self, ctx: &ReceiverContext) {
        if let (Some(span), Some(error)) = (span_of(ctx), ctx.error()) {
            span.record("error", field::display(&error.message));
        }
    }

    fn on_stop(&self, ctx: &mut ReceiverContext) -> Result<(), HandlerError> {
        let Some(ObservationSpan(span)) = ctx.extensions_mut().remove::<ObservationSpan>() else {
            return Ok(());
        };

        if let Some(route) = ctx.route() {
            span.record("http.route", route);
        }
        if let Some(response) = ctx.response() {
            span.record("http.response.status_code", response.status.as_u16());
        }
        let kvs = ctx.low_cardinality_key_values();
        if let Some(outcome) = kvs.get("outcome") {
            span.record("outcome", outcome);
        }

        ::tracing::info!(
            parent: &span,
            status = kvs.get("status").unwrap_or("UNKNOWN"),
            duration_ms = ctx.duration().map(|d| d.as_millis() as u64).unwrap_or_default(),
            "Request observed"
        );
        Ok(())
    }
}
