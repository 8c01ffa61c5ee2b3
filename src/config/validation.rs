//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Required values present (port)
//! - Value ranges and formats (token, addresses, limits)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: HarnessConfig → Result<(), Vec<ValidationError>>

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::HarnessConfig;
use crate::correlation::CorrelationToken;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required option --port")]
    MissingPort,

    #[error("invalid listener host `{0}'")]
    InvalidHost(String),

    #[error("invalid expected correlation token: {0}")]
    InvalidToken(String),

    #[error("correlation.token_length_bytes must be greater than 0")]
    ZeroTokenLength,

    #[error("limits.max_body_bytes must be greater than 0")]
    ZeroBodyLimit,

    #[error("unknown log level `{0}'")]
    UnknownLogLevel(String),

    #[error("invalid metrics address `{0}'")]
    InvalidMetricsAddress(String),
}

/// Check `config` and report every problem found.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port.is_none() {
        errors.push(ValidationError::MissingPort);
    }
    if config.listener.host.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::InvalidHost(config.listener.host.clone()));
    }

    if let Some(token) = &config.correlation.expected_token {
        if let Err(e) = CorrelationToken::new(token.as_str()) {
            errors.push(ValidationError::InvalidToken(e.to_string()));
        }
    }
    if config.correlation.token_length_bytes == 0 {
        errors.push(ValidationError::ZeroTokenLength);
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.observability.log_level.clone()));
    }
    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
