//! Observation provider.
//!
//! # Data Flow
//! ```text
//! Observation::start(convention, context supplier, registry)
//!     → registry.rs (no-op check, predicates / sampling)
//!     → handler.rs (on_start, in registration order)
//!     → handle.rs (Observation: scope open/close, error, stop)
//!     → convention.rs (name, key values computed at stop)
//!     → handler.rs (on_stop, in reverse order)
//! ```
//!
//! # Design Decisions
//! - One concrete context type for inbound requests, no dynamic downcasting
//! - Handlers own their per-observation state through context extensions
//! - Stop is idempotent; a second stop is a no-op

pub mod context;
pub mod convention;
pub mod handle;
pub mod handler;
pub mod registry;

pub use context::{ErrorInfo, KeyValue, KeyValues, ObservationId, ReceiverContext};
pub use convention::{DefaultReceiverConvention, ReceiverConvention, REQUEST_OBSERVATION_NAME};
pub use handle::{Observation, ObservationError, ObservationScope, Phase};
pub use handler::{HandlerError, ObservationHandler};
pub use registry::{
    ObservationPredicate, ObservationRegistry, ObservationRegistryBuilder, PathExclusionPredicate,
    SamplingPredicate,
};
