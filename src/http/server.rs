//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router serving the configured routes
//! - Wire up middleware (observation, timeout, request ID)
//! - Bind server to listener
//! - Answer suspended routes from a background task
//! - Shut down gracefully on signal

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::stream;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

use crate::adapter::RequestObservationAdapter;
use crate::config::{RouteConfig, ServiceConfig};
use crate::http::observation::{AsyncResponse, MatchedRoute, ObservationLayer};
use crate::observation::{Observation, ObservationRegistry};
use crate::routing::RouteTable;

/// Canned answer for one configured route.
#[derive(Debug, Clone)]
struct RouteEndpoint {
    status: StatusCode,
    body: String,
    delay: Duration,
}

impl RouteEndpoint {
    fn from_config(config: &RouteConfig) -> Self {
        let status = StatusCode::from_u16(config.status).unwrap_or_else(|_| {
            tracing::warn!(route = %config.name, status = config.status, "Invalid route status, answering 500");
            StatusCode::INTERNAL_SERVER_ERROR
        });
        Self {
            status,
            body: config.body.clone(),
            delay: Duration::from_millis(config.delay_ms),
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    endpoints: Arc<HashMap<String, RouteEndpoint>>,
}

/// HTTP server for the observed service.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    pub fn new(config: ServiceConfig, registry: ObservationRegistry) -> Self {
        Self::with_adapter(config, RequestObservationAdapter::new(registry))
    }

    /// Server whose observations go through the given adapter.
    pub fn with_adapter(config: ServiceConfig, adapter: RequestObservationAdapter) -> Self {
        let routes = Arc::new(RouteTable::from_config(&config.routes));
        let endpoints = config
            .routes
            .iter()
            .map(|route| (route.name.clone(), RouteEndpoint::from_config(route)))
            .collect();
        let state = AppState {
            endpoints: Arc::new(endpoints),
        };

        let router = Self::build_router(&config, state, ObservationLayer::new(adapter, routes));
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Timeouts sit inside the observation layer so timed-out requests are
    /// observed with their 408 status.
    #[allow(deprecated)]
    fn build_router(config: &ServiceConfig, state: AppState, observation: ObservationLayer) -> Router {
        Router::new()
            .fallback(route_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(observation)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for driving the server without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn wait_for_shutdown(mut shutdown: broadcast::Receiver<()>) {
    // A closed channel means the coordinator is gone; stop as well.
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}

/// Serves the endpoint of the route the observation layer matched.
///
/// Suspended routes answer from a background task, which reports its end
/// through the request's `AsyncResponse`.
async fn route_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let Some(MatchedRoute(route)) = request.extensions().get::<MatchedRoute>().cloned() else {
        tracing::debug!(path = %request.uri().path(), "No route matched");
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };
    let Some(endpoint) = state.endpoints.get(route.name()).cloned() else {
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    tracing::debug!(
        route = %route.name(),
        observation_id = ?request.extensions().get::<Observation>().and_then(Observation::id),
        suspended = route.is_suspended(),
        "Serving route"
    );

    if route.is_suspended() {
        let signal = request.extensions().get::<AsyncResponse>().cloned();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            tokio::time::sleep(endpoint.delay).await;
            // HEAD and bodyless answers drop the receiver unread.
            let _ = tx.send(endpoint.body);
            if let Some(signal) = signal {
                signal.complete();
            }
        });
        let body = Body::from_stream(stream::once(async move {
            rx.await.map_err(std::io::Error::other)
        }));
        return (endpoint.status, body).into_response();
    }

    if !endpoint.delay.is_zero() {
        tokio::time::sleep(endpoint.delay).await;
    }
    (endpoint.status, endpoint.body).into_response()
}
