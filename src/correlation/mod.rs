//! Correlation protocol subsystem.
//!
//! # Data Flow
//! ```text
//! driver
//!     → token.rs (generate CorrelationToken once per test run)
//!     → sends every request with X-Test-Env-Id: <token>
//!
//! harness process
//!     → http::request (read single-valued X-Test-Env-Id)
//!     → verifier.rs (compare with expected token)
//!     → Passed: forward to handler / Failed: 400 response
//! ```
//!
//! # Design Decisions
//! - Expected token is owned by the Dispatcher, never a global
//! - Verification is synchronous and never suspends
//! - Every failure is a response, never a fault

pub mod token;
pub mod verifier;

pub use token::{CorrelationToken, TokenError, DEFAULT_TOKEN_LENGTH_BYTES};
pub use verifier::{verify, Verification, VerificationFailure, TEST_ENV_ID_HEADER};
