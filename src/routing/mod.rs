//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → descriptor.rs (RouteDescriptor, capability flags precomputed)
//!     → matcher.rs (path template / method / host matchers)
//!     → router.rs (sort by priority, freeze as immutable RouteTable)
//!
//! Per request:
//!     RequestHead → RouteTable::resolve → Arc<RouteDescriptor> or None
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by priority)

pub mod descriptor;
pub mod matcher;
pub mod router;

pub use descriptor::{ParamDescriptor, ParamMarker, RouteDescriptor};
pub use router::RouteTable;
