//! Tower middleware driving the request observation adapter.
//!
//! # Responsibilities
//! - Build the per-exchange `RequestContext` from the request head
//! - Call `on_request_received` before the inner service
//! - Resolve the route and expose it to handlers as a request extension
//! - Call `on_response_ready` once the inner service produced a response
//! - For suspended routes, finish the observation when the body stream ends,
//!   or on the handler's `AsyncResponse` signal when the response has no body
//!
//! # Design Decisions
//! - The inner future runs inside the observation's span
//! - Observation failures surface as a 500; the inner response is discarded
//! - Dropping the response body before it ends abandons the observation
//! - HEAD answers and 1xx/204/304 statuses never have their body read, so
//!   those wait for the handler to signal instead

use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use axum::{
    body::Body,
    http::{Method, Request, Response, StatusCode},
    response::IntoResponse,
};
use futures_util::{future::BoxFuture, stream, StreamExt};
use tokio::sync::oneshot;
use tower::{Layer, Service};
use tracing::{Instrument, Span};

use crate::adapter::{AsyncCompletion, RequestObservationAdapter};
use crate::exchange::{RequestContext, RequestHead, ResponseHead};
use crate::observability::tracing::observation_span;
use crate::observation::ObservationError;
use crate::routing::{RouteDescriptor, RouteTable};

/// Route matched for the current request.
#[derive(Debug, Clone)]
pub struct MatchedRoute(pub Arc<RouteDescriptor>);

type Outcome = Result<(), String>;

/// Terminal signal for a suspended route, handed to the inner service as a
/// request extension. The first `complete` or `fail` wins; dropping every
/// clone without either leaves the exchange abandoned.
#[derive(Debug, Clone)]
pub struct AsyncResponse {
    sender: Arc<Mutex<Option<oneshot::Sender<Outcome>>>>,
}

impl AsyncResponse {
    fn channel() -> (Self, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        let signal = Self {
            sender: Arc::new(Mutex::new(Some(tx))),
        };
        (signal, rx)
    }

    /// The asynchronous work finished successfully.
    pub fn complete(&self) {
        self.send(Ok(()));
    }

    /// The asynchronous work failed with `message`.
    pub fn fail(&self, message: impl Into<String>) {
        self.send(Err(message.into()));
    }

    fn send(&self, outcome: Outcome) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            // The layer stops listening once the body carries completion.
            let _ = sender.send(outcome);
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObservationLayer {
    adapter: RequestObservationAdapter,
    routes: Arc<RouteTable>,
}

impl ObservationLayer {
    pub fn new(adapter: RequestObservationAdapter, routes: Arc<RouteTable>) -> Self {
        Self { adapter, routes }
    }
}

impl<S> Layer<S> for ObservationLayer {
    type Service = ObservationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ObservationService {
            inner,
            adapter: self.adapter.clone(),
            routes: self.routes.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObservationService<S> {
    inner: S,
    adapter: RequestObservationAdapter,
    routes: Arc<RouteTable>,
}

impl<S> Service<Request<Body>> for ObservationService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The ready service goes into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let adapter = self.adapter.clone();
        let routes = self.routes.clone();

        Box::pin(async move {
            let (mut parts, body) = request.into_parts();
            let mut exchange = RequestContext::new(RequestHead::from_parts(&parts));

            if let Err(err) = adapter.on_request_received(&mut exchange) {
                tracing::error!(error = %err, path = %parts.uri.path(), "Failed to start request observation");
                return Ok(err.into_response());
            }

            let mut signal = None;
            if let Some(route) = exchange.resolve_route(&routes).cloned() {
                if route.is_suspended() && exchange.observation().is_some() {
                    let (response, rx) = AsyncResponse::channel();
                    parts.extensions.insert(response);
                    signal = Some(rx);
                }
                parts.extensions.insert(MatchedRoute(route));
            }
            let method = parts.method.clone();
            let span = match exchange.observation() {
                Some(observation) => {
                    parts.extensions.insert(observation.clone());
                    observation_span(observation)
                }
                None => Span::none(),
            };

            let response = inner
                .call(Request::from_parts(parts, body))
                .instrument(span)
                .await?;

            let (parts, body) = response.into_parts();
            exchange.set_response(ResponseHead::from_parts(&parts));
            if let Err(err) = adapter.on_response_ready(&mut exchange) {
                tracing::error!(error = %err, "Failed to stop request observation");
                return Ok(err.into_response());
            }

            let body = match (exchange.take_async_completion(), signal) {
                (Some(completion), Some(signal)) if body_is_discarded(&method, parts.status) => {
                    complete_on_signal(signal, completion);
                    body
                }
                (Some(completion), _) => complete_at_end_of_body(body, completion),
                (None, _) => body,
            };
            Ok(Response::from_parts(parts, body))
        })
    }
}

/// Responses whose body hyper drops without polling it.
fn body_is_discarded(method: &Method, status: StatusCode) -> bool {
    method == Method::HEAD
        || status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Finish the pending observation when the handler signals its outcome.
fn complete_on_signal(signal: oneshot::Receiver<Outcome>, completion: AsyncCompletion) {
    tokio::spawn(async move {
        let stopped = match signal.await {
            Ok(Ok(())) => completion.complete(),
            Ok(Err(message)) => completion.fail("async_handler", message),
            // Every signal was dropped unanswered; dropping abandons.
            Err(_) => return,
        };
        if let Err(err) = stopped {
            tracing::warn!(error = %err, "Failed to stop suspended observation");
        }
    });
}

/// Wrap a body so the pending observation finishes with its last chunk.
fn complete_at_end_of_body(body: Body, completion: AsyncCompletion) -> Body {
    let chunks = stream::unfold(
        (body.into_data_stream(), Some(completion)),
        |(mut data, completion)| async move {
            let completion = completion?;
            match data.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), (data, Some(completion)))),
                Some(Err(err)) => {
                    if let Err(stop_err) = completion.fail("body_stream", err.to_string()) {
                        tracing::warn!(error = %stop_err, "Failed to stop suspended observation");
                    }
                    Some((Err(err), (data, None)))
                }
                None => {
                    if let Err(stop_err) = completion.complete() {
                        tracing::warn!(error = %stop_err, "Failed to stop suspended observation");
                    }
                    None
                }
            }
        },
    );
    Body::from_stream(chunks)
}

impl IntoResponse for ObservationError {
    fn into_response(self) -> axum::response::Response {
        (StatusCode::INTERNAL_SERVER_ERROR, "Request observation failed").into_response()
    }
}
