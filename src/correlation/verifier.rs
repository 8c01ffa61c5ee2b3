//! Correlation verification.
//!
//! # Responsibilities
//! - Read the correlation header through a caller-supplied reader
//! - Compare it with the expected token for the current run
//! - Turn any failure into a terminal 400 response
//!
//! # Design Decisions
//! - The verifier never sees the request, only a header reader, so it can
//!   be driven from anything that carries headers
//! - Missing, ambiguous and mismatched tokens get distinct messages

use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::correlation::token::CorrelationToken;
use crate::http::request::HeaderError;
use crate::http::response::OutboundResponse;

/// Header carrying the correlation token on every protected request.
pub const TEST_ENV_ID_HEADER: &str = "x-test-env-id";

/// Why a request was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// The request belongs to some other test run. `expected` is kept for
    /// logs and never rendered into the message.
    #[error("Received X-Test-Env-Id `{received}' does not match the one expected by this run")]
    Mismatch { expected: String, received: String },
}

impl VerificationFailure {
    pub fn kind(&self) -> &'static str {
        match self {
            VerificationFailure::Header(e) => e.kind(),
            VerificationFailure::Mismatch { .. } => "correlation_mismatch",
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    /// Diagnostic response returned instead of the handler's.
    pub fn to_response(&self) -> OutboundResponse {
        OutboundResponse::json(
            self.status(),
            json!({
                "error": self.to_string(),
                "kind": self.kind(),
            }),
        )
    }
}

/// Outcome of checking one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Passed,
    Failed(VerificationFailure),
}

impl Verification {
    pub fn is_passed(&self) -> bool {
        matches!(self, Verification::Passed)
    }

    /// Response describing this outcome.
    pub fn to_response(&self) -> OutboundResponse {
        match self {
            Verification::Passed => OutboundResponse::json(StatusCode::OK, json!({ "status": "ok" })),
            Verification::Failed(failure) => failure.to_response(),
        }
    }
}

/// Check the correlation header against `expected`.
///
/// `read_header` returns the single value of the named header.
pub fn verify<'a, F>(read_header: F, expected: &CorrelationToken) -> Verification
where
    F: FnOnce(&str) -> Result<&'a str, HeaderError>,
{
    let received = match read_header(TEST_ENV_ID_HEADER) {
        Ok(value) => value,
        Err(e) => return Verification::Failed(e.into()),
    };

    if expected.matches(received) {
        Verification::Passed
    } else {
        Verification::Failed(VerificationFailure::Mismatch {
            expected: expected.to_string(),
            received: received.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected() -> CorrelationToken {
        CorrelationToken::new("abc123").unwrap()
    }

    #[test]
    fn test_verify_passes_on_exact_match() {
        let outcome = verify(|_| Ok("abc123"), &expected());
        assert!(outcome.is_passed());
        assert_eq!(outcome.to_response().status(), StatusCode::OK);
    }

    #[test]
    fn test_verify_reads_the_correlation_header() {
        let mut asked = None;
        verify(
            |name| {
                asked = Some(name.to_string());
                Ok("abc123")
            },
            &expected(),
        );
        assert_eq!(asked.as_deref(), Some(TEST_ENV_ID_HEADER));
    }

    #[test]
    fn test_verify_mismatch() {
        let outcome = verify(|_| Ok("wrong"), &expected());
        let Verification::Failed(failure) = outcome else {
            panic!("expected failure");
        };
        assert_eq!(failure.kind(), "correlation_mismatch");
        assert!(failure.status().is_client_error());
        assert!(failure.to_string().contains("wrong"));
        assert!(!failure.to_string().contains("abc123"));
        let body = failure.to_response();
        assert!(!String::from_utf8_lossy(body.body()).contains("abc123"));
    }

    #[test]
    fn test_verify_header_errors_are_distinct() {
        let missing = verify(
            |name| Err(HeaderError::Missing { name: name.into() }),
            &expected(),
        );
        let ambiguous = verify(
            |name| {
                Err(HeaderError::Ambiguous {
                    name: name.into(),
                    values: vec!["abc123".into(), "abc123".into()],
                })
            },
            &expected(),
        );

        let missing = missing.to_response();
        let ambiguous = ambiguous.to_response();
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ambiguous.status(), StatusCode::BAD_REQUEST);
        assert_ne!(missing.body(), ambiguous.body());

        let body: serde_json::Value = serde_json::from_slice(ambiguous.body()).unwrap();
        assert_eq!(body["kind"], "ambiguous_header");
    }

    #[test]
    fn test_prefix_is_not_a_match() {
        let outcome = verify(|_| Ok("abc12"), &expected());
        assert!(!outcome.is_passed());
    }
}
