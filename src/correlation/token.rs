//! Per-test-run correlation tokens.

use std::fmt::{self, Write as _};
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token entropy used when the caller does not ask for a specific length.
pub const DEFAULT_TOKEN_LENGTH_BYTES: usize = 16;

/// Errors constructing a correlation token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Zero bytes of entropy or an empty string.
    #[error("correlation token must not be empty")]
    Empty,

    /// The token would not survive as an HTTP header value.
    #[error("correlation token must be visible ASCII, got {0:?}")]
    NotPrintable(String),
}

/// Opaque identifier binding requests to the currently active test run.
///
/// Generated once by the driver, then only compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Wrap an externally supplied token (e.g. from the command line).
    pub fn new(value: impl Into<String>) -> Result<Self, TokenError> {
        let value = value.into();
        if value.is_empty() {
            return Err(TokenError::Empty);
        }
        if !value.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(TokenError::NotPrintable(value));
        }
        Ok(Self(value))
    }

    /// Generate a fresh token from `length_in_bytes` random bytes, hex encoded.
    pub fn generate(length_in_bytes: usize) -> Result<Self, TokenError> {
        if length_in_bytes == 0 {
            return Err(TokenError::Empty);
        }
        let mut bytes = vec![0u8; length_in_bytes];
        rand::thread_rng().fill_bytes(&mut bytes);
        Ok(Self::from_entropy(&bytes))
    }

    /// Generate a token with [`DEFAULT_TOKEN_LENGTH_BYTES`] of entropy.
    pub fn generate_default() -> Self {
        let mut bytes = [0u8; DEFAULT_TOKEN_LENGTH_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_entropy(&bytes)
    }

    fn from_entropy(bytes: &[u8]) -> Self {
        let mut encoded = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            // Writing into a String cannot fail.
            let _ = write!(encoded, "{:02x}", byte);
        }
        Self(encoded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Byte-for-byte comparison against a received header value.
    pub fn matches(&self, candidate: &str) -> bool {
        self.0.as_bytes() == candidate.as_bytes()
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CorrelationToken {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for CorrelationToken {
    type Error = TokenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CorrelationToken> for String {
    fn from(token: CorrelationToken) -> Self {
        token.0
    }
}
