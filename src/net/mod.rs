//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! --port
//!     → listener.rs (bind host:port on the loop's runtime)
//!     → Hand off to http::server (accept loop)
//! ```
//!
//! # Design Decisions
//! - One socket per process, owned by the dispatcher
//! - No TLS, no connection limits: peers are the driver and its children

pub mod listener;

pub use listener::{bind, ListenerError};
