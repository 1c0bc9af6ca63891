//! Resolved route metadata.
//!
//! A route descriptor is the static description of a matched endpoint: its
//! template, method and parameter markers. Capability flags derived from the
//! markers are computed once, when the descriptor is built, so per-request
//! queries are plain field reads.

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Marker attached to an endpoint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamMarker {
    /// Parameter bound from a path segment.
    Path,
    /// Parameter bound from the query string.
    Query,
    /// Parameter bound from a request header.
    Header,
    /// Parameter bound from the request body.
    Body,
    /// Injected request context.
    Context,
    /// Asynchronous response handle; the endpoint completes after it returns.
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDescriptor {
    name: String,
    markers: Vec<ParamMarker>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            markers: Vec::new(),
        }
    }

    pub fn marker(mut self, marker: ParamMarker) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_marker(&self, marker: ParamMarker) -> bool {
        self.markers.contains(&marker)
    }
}

#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    name: String,
    template: String,
    method: Option<Method>,
    host: Option<String>,
    priority: u32,
    params: Vec<ParamDescriptor>,
    suspended: bool,
}

impl RouteDescriptor {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            method: None,
            host: None,
            priority: 0,
            params: Vec::new(),
            suspended: false,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.suspended |= param.has_marker(ParamMarker::Suspended);
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn http_method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn host_name(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn route_priority(&self) -> u32 {
        self.priority
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// True if any parameter carries [`ParamMarker::Suspended`].
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}
