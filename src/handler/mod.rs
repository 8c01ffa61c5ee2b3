//! Request handler contract.
//!
//! # Data Flow
//! ```text
//! Dispatcher (verified request)
//!     → RequestHandler::process_request
//!     → HandlerResponse::Immediate  → written now
//!     → HandlerResponse::Deferred   → written when settled
//!     → Err(HandlerFault) / panic   → critical log, process exit 1
//! ```
//!
//! # Design Decisions
//! - Handlers run synchronously; suspension only through `DeferredResponse`
//! - A synchronous fault is never turned into a 500
//! - Handlers declare their own correlation exemptions

pub mod scenario;

use std::any::Any;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;

use crate::correlation::CorrelationToken;
use crate::http::request::InboundRequest;
use crate::http::response::HandlerResponse;
use crate::http::server::STATUS_CHECK_PATH;

pub use scenario::ScenarioHandler;

/// Unexpected failure while producing a response.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct HandlerFault {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl HandlerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Fault caused by an underlying error.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Fault describing a panic payload caught around a handler call.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("handler panicked: {}", detail))
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message followed by every `caused by` in the source chain.
    pub fn detail(&self) -> String {
        let mut detail = self.message.clone();
        let mut source = StdError::source(self);
        while let Some(err) = source {
            detail.push_str(": caused by: ");
            detail.push_str(&err.to_string());
            source = err.source();
        }
        detail
    }
}

/// What the loop exposes to the `before_loop_run` extension point.
#[derive(Debug, Clone)]
pub struct LoopContext {
    pub local_addr: SocketAddr,
    pub expected_token: CorrelationToken,
}

/// Scenario-specific logic turning a verified request into a response.
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response for `request`.
    ///
    /// Returning `Err` (or panicking) terminates the process.
    fn process_request(&self, request: &InboundRequest) -> Result<HandlerResponse, HandlerFault>;

    /// Whether `request` must carry the expected correlation token.
    ///
    /// Defaults to every path except the status check.
    fn requires_correlation(&self, request: &InboundRequest) -> bool {
        request.path() != STATUS_CHECK_PATH
    }

    /// Called once on the loop thread after the socket is bound and before
    /// the first request is served. Tasks spawned here share the loop.
    fn before_loop_run(&self, _ctx: &LoopContext) {}
}

impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    fn process_request(&self, request: &InboundRequest) -> Result<HandlerResponse, HandlerFault> {
        (**self).process_request(request)
    }

    fn requires_correlation(&self, request: &InboundRequest) -> bool {
        (**self).requires_correlation(request)
    }

    fn before_loop_run(&self, ctx: &LoopContext) {
        (**self).before_loop_run(ctx)
    }
}
