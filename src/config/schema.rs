//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from a TOML file;
//! command-line options are layered on top by `lifecycle::startup`.

use serde::{Deserialize, Serialize};

use crate::correlation::DEFAULT_TOKEN_LENGTH_BYTES;

/// Root configuration for the harness process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Listener configuration (host, port).
    pub listener: ListenerConfig,

    /// Correlation protocol settings.
    pub correlation: CorrelationConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind.
    pub host: String,

    /// Port to bind. Required; 0 lets the OS pick.
    pub port: Option<u16>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: None,
        }
    }
}

/// Correlation protocol configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Expected X-Test-Env-Id for this run. Generated when absent.
    pub expected_token: Option<String>,

    /// Entropy of generated tokens.
    pub token_length_bytes: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            expected_token: None,
            token_length_bytes: DEFAULT_TOKEN_LENGTH_BYTES,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum buffered request body in bytes.
    pub max_body_bytes: usize,

    /// Time open connections get to finish after a stop request.
    pub drain_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            drain_timeout_ms: 2_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Prometheus endpoint bind address. Disabled when absent.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_address: None,
        }
    }
}
