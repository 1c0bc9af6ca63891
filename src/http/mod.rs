//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout)
//!     → observation.rs (request phase: observation started, route resolved)
//!     → server.rs route handler (canned or suspended answer)
//!     → observation.rs (response phase: observation stopped or deferred)
//!     → Send to client
//! ```

pub mod observation;
pub mod server;

pub use observation::{AsyncResponse, MatchedRoute, ObservationLayer, ObservationService};
pub use server::HttpServer;
