//! Request dispatcher: the event loop, the socket and the dispatch cycle.
//!
//! # Responsibilities
//! - Run a single-threaded loop owning the listening socket
//! - Verify correlation before any handler code runs
//! - Answer the status-check path
//! - Send immediate responses now and deferred ones when they settle
//! - Terminate the process on any synchronous handler fault
//!
//! # Design Decisions
//! - `start` builds a current-thread runtime: one thread, cooperative
//! - Handler calls are wrapped in `catch_unwind` so a panic is a fault too
//! - A deferred failure (rejection or panic) is a 500, only synchronous
//!   faults exit
//! - After a stop request open connections get a drain deadline; deferred
//!   responses still pending after it are abandoned

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::FutureExt;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::Instrument;

use crate::config::HarnessConfig;
use crate::correlation::{verify, CorrelationToken, Verification};
use crate::handler::{HandlerFault, LoopContext, RequestHandler};
use crate::http::request::{InboundRequest, UuidRequestId};
use crate::http::response::{HandlerResponse, OutboundResponse};
use crate::lifecycle::exit::{ProcessExit, StdProcessExit, EXIT_FAULT};
use crate::lifecycle::shutdown::{self, Shutdown};
use crate::net::{self, ListenerError};
use crate::observability::metrics;

/// Correlation-exempt liveness endpoint polled by the driver.
pub const STATUS_CHECK_PATH: &str = "/status_check";

const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors that stop the loop from starting or running.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("Failed to build event loop: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Where the dispatcher is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Loop not started.
    Idle,
    /// Socket bound, no synchronous dispatch running.
    Listening,
    /// A request is inside verification or the handler call.
    Dispatching,
    /// A handler faulted; the process is exiting.
    Terminated,
}

impl LoopPhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LoopPhase::Listening,
            2 => LoopPhase::Dispatching,
            3 => LoopPhase::Terminated,
            _ => LoopPhase::Idle,
        }
    }
}

/// Shared view of a dispatcher's [`LoopPhase`].
#[derive(Debug, Clone, Default)]
pub struct PhaseProbe(Arc<AtomicU8>);

impl PhaseProbe {
    pub fn get(&self) -> LoopPhase {
        LoopPhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move to `phase`. Nothing leaves `Terminated`.
    fn set(&self, phase: LoopPhase) {
        let _ = self.0.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            if current == LoopPhase::Terminated as u8 {
                None
            } else {
                Some(phase as u8)
            }
        });
    }
}

/// Result of the synchronous part of a dispatch.
#[derive(Debug)]
pub enum Dispatch {
    /// Correlation failed; the handler was not called.
    Rejected(OutboundResponse),
    /// Status-check path, answered without the handler.
    StatusCheck(OutboundResponse),
    /// The handler's response.
    Handled(HandlerResponse),
}

/// State injected into the axum fallback handler.
#[derive(Clone)]
struct DispatchState {
    handler: Arc<dyn RequestHandler>,
    expected_token: Arc<CorrelationToken>,
    exit: Arc<dyn ProcessExit>,
    phase: PhaseProbe,
    max_body_bytes: usize,
}

/// Single-socket, single-threaded dispatcher for correlated test traffic.
pub struct Dispatcher {
    state: DispatchState,
    host: String,
    drain_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher for `handler` expecting `expected_token` on every
    /// protected request.
    pub fn new(handler: impl RequestHandler, expected_token: CorrelationToken) -> Self {
        Self {
            state: DispatchState {
                handler: Arc::new(handler),
                expected_token: Arc::new(expected_token),
                exit: Arc::new(StdProcessExit),
                phase: PhaseProbe::default(),
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
            host: "127.0.0.1".to_string(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Create a dispatcher using the listener and limit settings of `config`.
    pub fn from_config(
        handler: impl RequestHandler,
        expected_token: CorrelationToken,
        config: &HarnessConfig,
    ) -> Self {
        Self::new(handler, expected_token)
            .with_host(config.listener.host.clone())
            .with_max_body_bytes(config.limits.max_body_bytes)
            .with_drain_timeout(Duration::from_millis(config.limits.drain_timeout_ms))
    }

    /// Replace how the process is terminated after a handler fault.
    pub fn with_process_exit(mut self, exit: impl ProcessExit) -> Self {
        self.state.exit = Arc::new(exit);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.state.max_body_bytes = max_body_bytes;
        self
    }

    /// How long open connections may take to finish once the loop is told
    /// to stop.
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn expected_token(&self) -> &CorrelationToken {
        &self.state.expected_token
    }

    pub fn phase_probe(&self) -> PhaseProbe {
        self.state.phase.clone()
    }

    /// Build the axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .fallback(dispatch)
            .with_state(self.state.clone())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
    }

    /// Bind `port` and run the loop on the calling thread until Ctrl-C.
    pub fn start(self, port: u16) -> Result<(), DispatchError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(DispatchError::Runtime)?;

        runtime.block_on(async move {
            let listener = net::bind(&self.host, port).await?;

            let stop = Shutdown::new();
            let stop_rx = stop.subscribe();
            tokio::spawn(async move {
                shutdown::ctrl_c().await;
                stop.trigger();
            });

            self.serve(listener, stop_rx).await
        })
    }

    /// Run the loop on an already bound listener until `stop` fires.
    pub async fn serve(
        self,
        listener: TcpListener,
        stop: broadcast::Receiver<()>,
    ) -> Result<(), DispatchError> {
        let local_addr: SocketAddr = listener.local_addr().map_err(DispatchError::Serve)?;
        let span = tracing::info_span!(
            "harness",
            test_env_id = %self.state.expected_token,
            port = local_addr.port()
        );

        async move {
            self.state.phase.set(LoopPhase::Listening);
            tracing::debug!(address = %local_addr, "Waiting for incoming requests...");

            self.state.handler.before_loop_run(&LoopContext {
                local_addr,
                expected_token: (*self.state.expected_token).clone(),
            });

            let drain = stop.resubscribe();
            let app = self.router();
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown::wait(stop))
                .into_future();
            tokio::pin!(server);

            tokio::select! {
                result = &mut server => result.map_err(DispatchError::Serve)?,
                _ = shutdown::wait(drain) => {
                    match tokio::time::timeout(self.drain_timeout, &mut server).await {
                        Ok(result) => result.map_err(DispatchError::Serve)?,
                        Err(_) => tracing::warn!(
                            drain_timeout_ms = self.drain_timeout.as_millis() as u64,
                            "Drain deadline reached - abandoning pending responses"
                        ),
                    }
                }
            }

            self.state.phase.set(LoopPhase::Idle);
            tracing::info!("Dispatcher loop stopped");
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// The synchronous part of one dispatch: correlation, status check,
    /// handler call.
    ///
    /// `Err` means the handler faulted; the loop terminates the process on it.
    pub fn on_request(&self, request: &InboundRequest) -> Result<Dispatch, HandlerFault> {
        self.state.on_request(request)
    }
}

impl DispatchState {
    fn on_request(&self, request: &InboundRequest) -> Result<Dispatch, HandlerFault> {
        self.phase.set(LoopPhase::Dispatching);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.route(request)))
            .unwrap_or_else(|payload| Err(HandlerFault::from_panic(payload)));
        self.phase.set(LoopPhase::Listening);
        outcome
    }

    fn route(&self, request: &InboundRequest) -> Result<Dispatch, HandlerFault> {
        if self.handler.requires_correlation(request) {
            let verification = verify(|name| request.single_header(name), &self.expected_token);
            if let Verification::Failed(failure) = verification {
                tracing::warn!(
                    path = %request.path(),
                    kind = failure.kind(),
                    error = %failure,
                    expected = %self.expected_token,
                    "Correlation check failed"
                );
                return Ok(Dispatch::Rejected(failure.to_response()));
            }
        }

        if request.path() == STATUS_CHECK_PATH {
            return Ok(Dispatch::StatusCheck(Verification::Passed.to_response()));
        }

        self.handler.process_request(request).map(Dispatch::Handled)
    }

    async fn dispatch(self, request: InboundRequest, start: Instant) -> Response {
        tracing::trace!(
            uri = %request.uri(),
            method = %request.method(),
            "Received request"
        );

        let dispatched = match self.on_request(&request) {
            Ok(dispatched) => dispatched,
            Err(fault) => self.terminate(&request, fault, start),
        };

        match dispatched {
            Dispatch::Rejected(response) => {
                metrics::record_request(metrics::OUTCOME_REJECTED, start);
                response.into_response()
            }
            Dispatch::StatusCheck(response) => {
                metrics::record_request(metrics::OUTCOME_STATUS_CHECK, start);
                response.into_response()
            }
            Dispatch::Handled(HandlerResponse::Immediate(response)) => {
                tracing::trace!(
                    status_code = response.status().as_u16(),
                    reason_phrase = response.reason_phrase(),
                    "Sending response ..."
                );
                metrics::record_request(metrics::OUTCOME_IMMEDIATE, start);
                response.into_response()
            }
            Dispatch::Handled(HandlerResponse::Deferred(deferred)) => {
                tracing::trace!("Deferred response returned - response will be sent later...");

                let pending = PendingDeferred::new();
                let settled = AssertUnwindSafe(deferred.settle())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| Err(HandlerFault::from_panic(payload)));
                drop(pending);

                match settled {
                    Ok(response) => {
                        tracing::trace!(
                            status_code = response.status().as_u16(),
                            reason_phrase = response.reason_phrase(),
                            "Sending deferred response ..."
                        );
                        metrics::record_request(metrics::OUTCOME_DEFERRED, start);
                        response.into_response()
                    }
                    Err(fault) => {
                        tracing::error!(error = %fault.detail(), "Deferred response failed");
                        metrics::record_request(metrics::OUTCOME_DEFERRED_FAILED, start);
                        OutboundResponse::json(
                            StatusCode::INTERNAL_SERVER_ERROR,
                            json!({ "error": fault.message(), "kind": "deferred_failed" }),
                        )
                        .into_response()
                    }
                }
            }
        }
    }

    /// Log the fault at critical level and end the process.
    fn terminate(&self, request: &InboundRequest, fault: HandlerFault, start: Instant) -> ! {
        self.phase.set(LoopPhase::Terminated);
        metrics::record_request(metrics::OUTCOME_FAULT, start);
        tracing::error!(
            critical = true,
            method = %request.method(),
            uri = %request.uri(),
            error = %fault,
            detail = %fault.detail(),
            "Request handler faulted - terminating this process"
        );
        self.exit.exit(EXIT_FAULT)
    }
}

/// Keeps the pending-deferred gauge right even if the client goes away.
struct PendingDeferred;

impl PendingDeferred {
    fn new() -> Self {
        metrics::deferred_started();
        Self
    }
}

impl Drop for PendingDeferred {
    fn drop(&mut self) {
        metrics::deferred_settled();
    }
}

/// Fallback handler: every path and method goes through the dispatch cycle.
async fn dispatch(State(state): State<DispatchState>, request: Request<Body>) -> Response {
    let start = Instant::now();

    let request = match InboundRequest::from_axum(request, state.max_body_bytes).await {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read request body");
            return OutboundResponse::json(
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Failed to read request body: {}", e), "kind": "bad_body" }),
            )
            .into_response();
        }
    };

    let span = tracing::debug_span!(
        "dispatch",
        request_id = %request.request_id(),
        test_env_id = %state.expected_token
    );
    state.dispatch(request, start).instrument(span).await
}
