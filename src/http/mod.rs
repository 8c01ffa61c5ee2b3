//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (single-threaded loop)
//!     → server.rs (axum setup, request ID, tracing layers)
//!     → request.rs (buffer into InboundRequest, single-valued headers)
//!     → correlation::verifier (X-Test-Env-Id check)
//!     → handler::RequestHandler
//!     → response.rs (immediate or deferred OutboundResponse)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{HeaderError, InboundRequest, UuidRequestId, X_REQUEST_ID};
pub use response::{DeferredResponse, HandlerResponse, OutboundResponse, Resolver, Settlement};
pub use server::{Dispatch, DispatchError, Dispatcher, LoopPhase, PhaseProbe, STATUS_CHECK_PATH};
