//! Response values produced by handlers.
//!
//! # Responsibilities
//! - `OutboundResponse`: status, headers, body, written once
//! - `DeferredResponse`: a response completed later on the same loop
//! - `HandlerResponse`: the tagged union the dispatcher branches on
//!
//! # Design Decisions
//! - A `Resolver` is consumed by `resolve`/`reject`, so a deferred
//!   response can be settled at most once
//! - Dropping a `Resolver` unsettled counts as a failed resolution

use std::fmt;
use std::future::Future;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::handler::HandlerFault;

/// A complete HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl OutboundResponse {
    /// Empty-bodied response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// Plain-text body.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"))
            .with_body(body.into())
    }

    /// JSON body.
    pub fn json(status: StatusCode, value: serde_json::Value) -> Self {
        Self::new(status)
            .with_header(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(value.to_string())
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the status, empty for unknown codes.
    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

impl IntoResponse for OutboundResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}

/// Outcome a deferred response eventually settles to.
pub type Settlement = Result<OutboundResponse, HandlerFault>;

/// A response that is not available yet.
///
/// The dispatcher awaits it on the event loop; other connections keep being
/// served in the meantime.
pub struct DeferredResponse {
    inner: BoxFuture<'static, Settlement>,
}

impl DeferredResponse {
    /// Create a deferred response settled through the returned [`Resolver`].
    pub fn pending() -> (Self, Resolver) {
        let (tx, rx) = oneshot::channel();
        let inner = async move {
            match rx.await {
                Ok(settlement) => settlement,
                Err(_) => Err(HandlerFault::new("deferred response dropped before it was resolved")),
            }
        };
        (Self { inner: inner.boxed() }, Resolver { tx })
    }

    /// Create a deferred response driven by a future.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Settlement> + Send + 'static,
    {
        Self { inner: future.boxed() }
    }

    /// Wait for the single resolution.
    pub async fn settle(self) -> Settlement {
        self.inner.await
    }
}

impl fmt::Debug for DeferredResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredResponse { .. }")
    }
}

/// Completes a [`DeferredResponse`] exactly once.
#[derive(Debug)]
pub struct Resolver {
    tx: oneshot::Sender<Settlement>,
}

impl Resolver {
    /// Complete with a response. Has no effect if the request is gone.
    pub fn resolve(self, response: OutboundResponse) {
        let _ = self.tx.send(Ok(response));
    }

    /// Complete with a failure.
    pub fn reject(self, fault: HandlerFault) {
        let _ = self.tx.send(Err(fault));
    }

    /// True once the waiting side has gone away (client disconnected).
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What a handler returns for a verified request.
#[derive(Debug)]
pub enum HandlerResponse {
    /// Ready now; sent as soon as the handler returns.
    Immediate(OutboundResponse),
    /// Sent when the deferred response settles.
    Deferred(DeferredResponse),
}

impl From<OutboundResponse> for HandlerResponse {
    fn from(response: OutboundResponse) -> Self {
        HandlerResponse::Immediate(response)
    }
}

impl From<DeferredResponse> for HandlerResponse {
    fn from(deferred: DeferredResponse) -> Self {
        HandlerResponse::Deferred(deferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_phrase() {
        assert_eq!(OutboundResponse::ok().reason_phrase(), "OK");
        assert_eq!(OutboundResponse::new(StatusCode::BAD_REQUEST).reason_phrase(), "Bad Request");
    }

    #[test]
    fn test_json_sets_content_type() {
        let resp = OutboundResponse::json(StatusCode::OK, serde_json::json!({"status": "ok"}));
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(resp.body().as_ref(), br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_deferred_resolves_once() {
        let (deferred, resolver) = DeferredResponse::pending();
        resolver.resolve(OutboundResponse::text(StatusCode::OK, "later"));
        let resp = deferred.settle().await.unwrap();
        assert_eq!(resp.body().as_ref(), b"later");
    }

    #[tokio::test]
    async fn test_deferred_rejected() {
        let (deferred, resolver) = DeferredResponse::pending();
        resolver.reject(HandlerFault::new("boom"));
        let fault = deferred.settle().await.unwrap_err();
        assert_eq!(fault.to_string(), "boom");
    }

    #[tokio::test]
    async fn test_dropped_resolver_is_failure() {
        let (deferred, resolver) = DeferredResponse::pending();
        drop(resolver);
        assert!(deferred.settle().await.is_err());
    }

    #[tokio::test]
    async fn test_abandoned_resolver() {
        let (deferred, resolver) = DeferredResponse::pending();
        assert!(!resolver.is_abandoned());
        drop(deferred);
        assert!(resolver.is_abandoned());
    }
}
