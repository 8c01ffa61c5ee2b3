//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → lifecycle::startup (apply --port, --test-env-id, ... overrides)
//!     → validation.rs (semantic checks)
//!     → HarnessConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the loop starts
//! - All fields have defaults except the port
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, StartupConfigError};
pub use schema::{CorrelationConfig, HarnessConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig};
pub use validation::{validate_config, ValidationError};
