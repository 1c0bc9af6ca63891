//! Route lookup.
//!
//! # Responsibilities
//! - Compile route descriptors and their matchers once, at startup
//! - Look up the matching route for a request head
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Higher priority first; equal priorities keep declaration order
//! - First match wins; no match is explicit (`None`), never a silent default

use std::sync::Arc;

use axum::http::Method;

use crate::config::RouteConfig;
use crate::exchange::RequestHead;
use crate::routing::descriptor::{ParamDescriptor, RouteDescriptor};
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, MethodMatcher, PathTemplateMatcher};

#[derive(Debug)]
struct CompiledRoute {
    descriptor: Arc<RouteDescriptor>,
    matcher: AndMatcher,
}

/// Immutable, priority-ordered route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new(descriptors: Vec<RouteDescriptor>) -> Self {
        let mut routes: Vec<CompiledRoute> = descriptors
            .into_iter()
            .map(|descriptor| CompiledRoute {
                matcher: compile(&descriptor),
                descriptor: Arc::new(descriptor),
            })
            .collect();
        // Stable sort keeps declaration order among equal priorities.
        routes.sort_by(|a, b| {
            b.descriptor
                .route_priority()
                .cmp(&a.descriptor.route_priority())
        });
        Self { routes }
    }

    /// Build from configuration. Routes with an unparseable method are skipped.
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut descriptors = Vec::with_capacity(configs.len());
        for config in configs {
            let mut descriptor =
                RouteDescriptor::new(config.name.clone(), config.path.clone()).priority(config.priority);

            if let Some(method) = &config.method {
                match method.to_uppercase().parse::<Method>() {
                    Ok(m) => descriptor = descriptor.method(m),
                    Err(_) => {
                        tracing::warn!(route = %config.name, method = %method, "Invalid route method, skipping route");
                        continue;
                    }
                }
            }
            if let Some(host) = &config.host {
                descriptor = descriptor.host(host.clone());
            }
            for param in &config.params {
                let compiled = param
                    .markers
                    .iter()
                    .fold(ParamDescriptor::new(param.name.clone()), |p, m| p.marker(*m));
                descriptor = descriptor.param(compiled);
            }

            tracing::debug!(
                route = %descriptor.name(),
                template = %descriptor.template(),
                suspended = descriptor.is_suspended(),
                "Route registered"
            );
            descriptors.push(descriptor);
        }
        Self::new(descriptors)
    }

    pub fn resolve(&self, req: &RequestHead) -> Option<Arc<RouteDescriptor>> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(req))
            .map(|route| route.descriptor.clone())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

fn compile(descriptor: &RouteDescriptor) -> AndMatcher {
    let mut matchers: Vec<Box<dyn Matcher>> =
        vec![Box::new(PathTemplateMatcher::new(descriptor.template()))];
    if let Some(method) = descriptor.http_method() {
        matchers.push(Box::new(MethodMatcher::new(method.clone())));
    }
    if let Some(host) = descriptor.host_name() {
        matchers.push(Box::new(HostMatcher::new(host)));
    }
    AndMatcher::new(matchers)
}
