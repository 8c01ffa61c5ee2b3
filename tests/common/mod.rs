//! Shared utilities for dispatcher integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use harness_server::handler::{HandlerFault, RequestHandler};
use harness_server::http::{DeferredResponse, HandlerResponse, InboundRequest, OutboundResponse, PhaseProbe};
use harness_server::lifecycle::ProcessExit;
use harness_server::{CorrelationToken, Dispatcher, Shutdown};
use serde_json::json;
use tokio::net::TcpListener;

/// Records the requested exit status instead of exiting, then unwinds the
/// connection task so no response is written.
#[derive(Clone)]
pub struct RecordingExit {
    code: Arc<AtomicI32>,
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) -> ! {
        self.code.store(code, Ordering::SeqCst);
        panic!("process exit requested with status {}", code);
    }
}

/// Handler that counts invocations and serves a few fixed behaviors.
#[derive(Default)]
pub struct SpyHandler {
    calls: AtomicUsize,
}

impl SpyHandler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RequestHandler for SpyHandler {
    fn process_request(&self, request: &InboundRequest) -> Result<HandlerResponse, HandlerFault> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match request.path() {
            "/slow" => Ok(delayed("A", 300).into()),
            "/fast" => Ok(delayed("B", 20).into()),
            "/fault" => Err(HandlerFault::new("spy fault")),
            "/panic" => panic!("spy panic"),
            path => Ok(OutboundResponse::json(
                StatusCode::OK,
                json!({ "path": path, "method": request.method().as_str() }),
            )
            .into()),
        }
    }
}

fn delayed(body: &'static str, ms: u64) -> DeferredResponse {
    DeferredResponse::from_future(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(OutboundResponse::text(StatusCode::OK, body))
    })
}

/// A dispatcher running on the test's runtime.
pub struct TestHarness {
    pub addr: SocketAddr,
    pub spy: Arc<SpyHandler>,
    pub phase: PhaseProbe,
    exit_code: Arc<AtomicI32>,
    shutdown: Shutdown,
}

impl TestHarness {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Exit status requested by the dispatcher, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self.exit_code.load(Ordering::SeqCst) {
            -1 => None,
            code => Some(code),
        }
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a dispatcher on an OS-assigned port expecting `token`.
pub async fn start_harness(token: &str) -> TestHarness {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let spy = Arc::new(SpyHandler::default());
    let exit_code = Arc::new(AtomicI32::new(-1));
    let dispatcher = Dispatcher::new(spy.clone(), CorrelationToken::new(token).unwrap())
        .with_process_exit(RecordingExit { code: exit_code.clone() });
    let phase = dispatcher.phase_probe();

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = dispatcher.serve(listener, stop).await;
    });

    TestHarness {
        addr,
        spy,
        phase,
        exit_code,
        shutdown,
    }
}

/// Client that never reuses a connection the dispatcher may have killed.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
