//! Correlated HTTP dispatcher for distributed test scenarios.

pub mod config;
pub mod correlation;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::HarnessConfig;
pub use correlation::CorrelationToken;
pub use handler::{HandlerFault, RequestHandler};
pub use http::Dispatcher;
pub use lifecycle::Shutdown;
