//! Inbound request model and header access.
//!
//! # Responsibilities
//! - Buffer the raw axum request into an immutable `InboundRequest`
//! - Preserve header multiplicity (one name, many values)
//! - Extract single-valued headers, failing loudly otherwise
//! - Generate a request ID (UUID v4) for log correlation
//!
//! # Design Decisions
//! - Two values for a protocol header is a client error, never resolved
//! - Body is fully buffered; handlers see bytes, not a stream

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use thiserror::Error;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header set by the request-id layer on every inbound request.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Assigns a UUID v4 request ID to requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let value = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(value))
    }
}

/// Errors reading a single-valued header.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// No value present.
    #[error("Missing required HTTP request header `{name}'")]
    Missing { name: String },

    /// More than one value present.
    #[error("Header `{name}' should not have more than one value. Instead found: {values:?}")]
    Ambiguous { name: String, values: Vec<String> },

    /// A value that is not visible ASCII.
    #[error("Header `{name}' has a value that is not valid text")]
    NotText { name: String },
}

impl HeaderError {
    /// Short machine-readable tag for diagnostic bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            HeaderError::Missing { .. } => "missing_header",
            HeaderError::Ambiguous { .. } => "ambiguous_header",
            HeaderError::NotText { .. } => "header_not_text",
        }
    }
}

/// A fully received HTTP request, read-only for the rest of its dispatch.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
        }
    }

    /// Buffer an axum request, refusing bodies larger than `max_body_bytes`.
    pub async fn from_axum(request: Request<Body>, max_body_bytes: usize) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes).await?;
        Ok(Self::new(parts.method, parts.uri, parts.headers, body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Value of `key` in the query string, first occurrence wins.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query()?
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Request ID assigned by the middleware stack, if any.
    pub fn request_id(&self) -> &str {
        self.headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }

    /// Return the one value of header `name`.
    ///
    /// Zero values and multiple values are both errors.
    pub fn single_header(&self, name: &str) -> Result<&str, HeaderError> {
        let mut values = self.headers.get_all(name).iter();

        let first = values.next().ok_or_else(|| HeaderError::Missing {
            name: name.to_string(),
        })?;

        let rest: Vec<_> = values.collect();
        if !rest.is_empty() {
            let values = std::iter::once(first)
                .chain(rest)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            return Err(HeaderError::Ambiguous {
                name: name.to_string(),
                values,
            });
        }

        first.to_str().map_err(|_| HeaderError::NotText {
            name: name.to_string(),
        })
    }
}
