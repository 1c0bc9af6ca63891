//! Route matching logic.
//!
//! # Responsibilities
//! - Match host header (exact match, case-insensitive)
//! - Match request method
//! - Match path templates (`/orders/{id}`, trailing `{*rest}`)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - Path matching is case-sensitive
//! - Empty condition = always matches (wildcard)
//! - No regex to guarantee O(n) matching

use axum::http::Method;

use crate::exchange::RequestHead;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RequestHead) -> bool;
}

/// Matches the Host header.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RequestHead) -> bool {
        req.header("host")
            .map(|h| h.to_lowercase() == self.expected_host)
            .unwrap_or(false)
    }
}

/// Matches the request method.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    method: Method,
}

impl MethodMatcher {
    pub fn new(method: Method) -> Self {
        Self { method }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RequestHead) -> bool {
        req.method == self.method
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param,
    CatchAll,
}

/// Matches the request path against a template.
///
/// `{name}` matches exactly one non-empty segment, a trailing `{*name}`
/// matches the rest of the path (including nothing).
#[derive(Debug, Clone)]
pub struct PathTemplateMatcher {
    segments: Vec<Segment>,
}

impl PathTemplateMatcher {
    pub fn new(template: &str) -> Self {
        let segments = split(template)
            .map(|s| {
                if s.starts_with("{*") && s.ends_with('}') {
                    Segment::CatchAll
                } else if s.starts_with('{') && s.ends_with('}') {
                    Segment::Param
                } else {
                    Segment::Literal(s.to_string())
                }
            })
            .collect();
        Self { segments }
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl Matcher for PathTemplateMatcher {
    fn matches(&self, req: &RequestHead) -> bool {
        let mut path = split(req.path());
        for segment in &self.segments {
            match segment {
                Segment::CatchAll => return true,
                Segment::Param => {
                    if path.next().is_none() {
                        return false;
                    }
                }
                Segment::Literal(expected) => match path.next() {
                    Some(actual) if actual == expected => {}
                    _ => return false,
                },
            }
        }
        path.next().is_none()
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RequestHead) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}
