//! Observation context carried from start to stop.
//!
//! The context is created from the request head when an observation starts,
//! picks up the matched route and the response head when the response is
//! ready, and accumulates the key values computed by the convention at stop.
//! Handlers keep their own per-observation state in the typed extension map.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::http::Extensions;

use crate::exchange::{RequestHead, ResponseHead};

/// Global counter for observation IDs. Only uniqueness is needed.
static OBSERVATION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of a started observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationId(u64);

impl ObservationId {
    pub(crate) fn next() -> Self {
        Self(OBSERVATION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obs-{}", self.0)
    }
}

/// A single tag attached to an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: &'static str,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// Ordered set of key values; keys are unique, later writes replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValues(Vec<KeyValue>);

impl KeyValues {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn and(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.insert(KeyValue::new(key, value));
        self
    }

    pub fn insert(&mut self, kv: KeyValue) {
        match self.0.iter_mut().find(|existing| existing.key == kv.key) {
            Some(existing) => existing.value = kv.value,
            None => self.0.push(kv),
        }
    }

    pub fn extend(&mut self, other: KeyValues) {
        for kv in other.0 {
            self.insert(kv);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Error recorded against an observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Low-cardinality classification, used as the `exception` tag.
    pub kind: String,
    pub message: String,
}

/// Context of an inbound request observation.
#[derive(Debug)]
pub struct ReceiverContext {
    id: Option<ObservationId>,
    name: String,
    contextual_name: String,
    request: RequestHead,
    route: Option<String>,
    response: Option<ResponseHead>,
    error: Option<ErrorInfo>,
    low_cardinality: KeyValues,
    high_cardinality: KeyValues,
    duration: Option<Duration>,
    extensions: Extensions,
}

impl ReceiverContext {
    /// Wrap the request head of a freshly received exchange.
    pub fn new(request: RequestHead) -> Self {
        Self {
            id: None,
            name: String::new(),
            contextual_name: String::new(),
            request,
            route: None,
            response: None,
            error: None,
            low_cardinality: KeyValues::empty(),
            high_cardinality: KeyValues::empty(),
            duration: None,
            extensions: Extensions::new(),
        }
    }

    /// ID of the owning observation. `None` until the observation starts.
    pub fn id(&self) -> Option<ObservationId> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ObservationId) {
        self.id = Some(id);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn contextual_name(&self) -> &str {
        &self.contextual_name
    }

    pub fn set_contextual_name(&mut self, name: impl Into<String>) {
        self.contextual_name = name.into();
    }

    pub fn request(&self) -> &RequestHead {
        &self.request
    }

    /// Template of the matched route, once routing has resolved.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn set_route(&mut self, template: impl Into<String>) {
        self.route = Some(template.into());
    }

    /// Response head; only present once the response is ready.
    pub fn response(&self) -> Option<&ResponseHead> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: ResponseHead) {
        self.response = Some(response);
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn set_error(&mut self, kind: impl Into<String>, message: impl Into<String>) {
        self.error = Some(ErrorInfo {
            kind: kind.into(),
            message: message.into(),
        });
    }

    pub fn low_cardinality_key_values(&self) -> &KeyValues {
        &self.low_cardinality
    }

    pub fn high_cardinality_key_values(&self) -> &KeyValues {
        &self.high_cardinality
    }

    pub fn add_low_cardinality_key_values(&mut self, kvs: KeyValues) {
        self.low_cardinality.extend(kvs);
    }

    pub fn add_high_cardinality_key_values(&mut self, kvs: KeyValues) {
        self.high_cardinality.extend(kvs);
    }

    /// Time between start and stop. Set right before stop handlers run.
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub(crate) fn set_duration(&mut self, duration: Duration) {
        self.duration = Some(duration);
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
