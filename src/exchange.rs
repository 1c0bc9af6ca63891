//! Per-exchange state shared by the two interception points.
//!
//! # Responsibilities
//! - Snapshot the request head when the exchange arrives
//! - Late-bind the response head once the inner service answers
//! - Hold the matched route descriptor
//! - Carry the active observation between request and response phase
//!
//! # Design Decisions
//! - The observation lives in a typed slot, not a string-keyed property map
//! - At most one observation per exchange; storing a second one abandons the first
//! - The context is owned by the pipeline future and never shared across exchanges

use std::sync::Arc;

use axum::http::{request, response, HeaderMap, Method, StatusCode, Uri, Version};

use crate::adapter::{AsyncCompletion, ScopeHolder};
use crate::observation::Observation;
use crate::routing::{RouteDescriptor, RouteTable};

/// Name of the observation slot, used when logging about it.
pub const OBSERVATION_SCOPE: &str = "request_observer.observation_scope";

/// Read-only snapshot of the inbound request metadata.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
        }
    }

    pub fn from_parts(parts: &request::Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Snapshot of the outbound response metadata.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    pub fn from_parts(parts: &response::Parts) -> Self {
        Self {
            status: parts.status,
            headers: parts.headers.clone(),
        }
    }
}

/// State of one exchange as seen by the observation adapter.
#[derive(Debug)]
pub struct RequestContext {
    request: RequestHead,
    response: Option<ResponseHead>,
    route: Option<Arc<RouteDescriptor>>,
    observation: Option<ScopeHolder>,
    async_completion: Option<AsyncCompletion>,
}

impl RequestContext {
    pub fn new(request: RequestHead) -> Self {
        Self {
            request,
            response: None,
            route: None,
            observation: None,
            async_completion: None,
        }
    }

    pub fn request(&self) -> &RequestHead {
        &self.request
    }

    pub fn response(&self) -> Option<&ResponseHead> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: ResponseHead) {
        self.response = Some(response);
    }

    pub fn matched_route(&self) -> Option<&Arc<RouteDescriptor>> {
        self.route.as_ref()
    }

    pub fn set_matched_route(&mut self, route: Arc<RouteDescriptor>) {
        self.route = Some(route);
    }

    /// Match the request against the route table and remember the result.
    pub fn resolve_route(&mut self, routes: &RouteTable) -> Option<&Arc<RouteDescriptor>> {
        self.route = routes.resolve(&self.request);
        self.route.as_ref()
    }

    /// Active observation, if one was started for this exchange.
    pub fn observation(&self) -> Option<&Observation> {
        self.observation.as_ref().map(ScopeHolder::observation)
    }

    pub fn set_observation(&mut self, holder: ScopeHolder) {
        if let Some(previous) = self.observation.replace(holder) {
            tracing::warn!(
                slot = OBSERVATION_SCOPE,
                observation_id = ?previous.observation().id(),
                "Observation slot already occupied, abandoning previous observation"
            );
        }
    }

    pub fn take_observation(&mut self) -> Option<ScopeHolder> {
        self.observation.take()
    }

    pub fn set_async_completion(&mut self, completion: AsyncCompletion) {
        self.async_completion = Some(completion);
    }

    /// Completion token left behind by a deferred (suspended) observation.
    pub fn take_async_completion(&mut self) -> Option<AsyncCompletion> {
        self.async_completion.take()
    }
}
