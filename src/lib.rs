//! Request observation for HTTP services.
//!
//! An observation starts when a request arrives and stops once its response
//! is ready. Routes whose result is produced asynchronously keep the
//! observation open until the response body completes.

pub mod adapter;
pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod observation;
pub mod routing;

pub use adapter::RequestObservationAdapter;
pub use config::schema::ServiceConfig;
pub use error::Error;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use observation::{Observation, ObservationRegistry};
