//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Parse args → Load config file → Apply overrides → Validate
//!
//! Running:
//!     Dispatcher loop until shutdown.rs fires (Ctrl-C, or a test trigger)
//!
//! Fault (exit.rs):
//!     Handler fault → critical log → ProcessExit::exit(1)
//! ```
//!
//! # Design Decisions
//! - Startup errors exit 1 before any socket is bound
//! - Exit goes through a trait so tests can observe it in-process

pub mod exit;
pub mod shutdown;
pub mod startup;

pub use exit::{ProcessExit, StdProcessExit, EXIT_FAULT};
pub use shutdown::Shutdown;
pub use startup::{ParseOutcome, StartupArgs};
