//! Built-in mock-collector scenario served by the `harness-server` binary.
//!
//! Subordinate processes post intake events; the driver long-polls for them.
//! A poll with nothing new to return is answered with a deferred response
//! that the next intake resolves.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use axum::http::{header, Method, StatusCode};
use serde::Serialize;
use serde_json::json;

use crate::handler::{HandlerFault, LoopContext, RequestHandler};
use crate::http::request::InboundRequest;
use crate::http::response::{DeferredResponse, HandlerResponse, OutboundResponse, Resolver};

pub const INTAKE_PATH: &str = "/intake/v2/events";
pub const INTAKE_QUERY_PATH: &str = "/harness/intake";
pub const ECHO_PATH: &str = "/harness/echo";
pub const DELAY_PATH: &str = "/harness/delay";
pub const FAULT_PATH: &str = "/harness/fault";

/// Upper bound for `/harness/delay`.
const MAX_DELAY_MS: u64 = 60_000;

/// One body received on the intake endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IntakeRecord {
    pub index: usize,
    pub request_id: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Default)]
struct IntakeState {
    records: Vec<IntakeRecord>,
    /// Long polls waiting for a record at or after their `from` index.
    waiters: Vec<(usize, Resolver)>,
}

/// Mock collector: intake, long-poll, echo, delay and fault endpoints.
#[derive(Default)]
pub struct ScenarioHandler {
    intake: Mutex<IntakeState>,
}

impl ScenarioHandler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, IntakeState>, HandlerFault> {
        self.intake
            .lock()
            .map_err(|_| HandlerFault::new("intake state poisoned by an earlier panic"))
    }

    fn accept_intake(&self, request: &InboundRequest) -> Result<HandlerResponse, HandlerFault> {
        let mut state = self.lock()?;

        let index = state.records.len();
        state.records.push(IntakeRecord {
            index,
            request_id: request.request_id().to_string(),
            content_type: request
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            body: String::from_utf8_lossy(request.body()).into_owned(),
        });

        let waiters = std::mem::take(&mut state.waiters);
        let mut woken = 0;
        for (from, resolver) in waiters {
            if from <= index {
                resolver.resolve(records_response(&state.records[from..]));
                woken += 1;
            } else if !resolver.is_abandoned() {
                state.waiters.push((from, resolver));
            }
        }

        tracing::debug!(index, woken, "Intake event recorded");
        Ok(OutboundResponse::json(StatusCode::ACCEPTED, json!({ "accepted": index })).into())
    }

    fn query_intake(&self, request: &InboundRequest) -> Result<HandlerResponse, HandlerFault> {
        let from = match request.query_param("from").map(str::parse::<usize>) {
            None => 0,
            Some(Ok(from)) => from,
            Some(Err(_)) => {
                return Ok(OutboundResponse::text(
                    StatusCode::BAD_REQUEST,
                    "`from' must be a non-negative integer",
                )
                .into());
            }
        };

        let mut state = self.lock()?;
        if from < state.records.len() {
            return Ok(records_response(&state.records[from..]).into());
        }

        state.waiters.retain(|(_, resolver)| !resolver.is_abandoned());
        let (deferred, resolver) = DeferredResponse::pending();
        state.waiters.push((from, resolver));
        tracing::debug!(from, waiting = state.waiters.len(), "Intake poll deferred");
        Ok(deferred.into())
    }
}

impl RequestHandler for ScenarioHandler {
    fn process_request(&self, request: &InboundRequest) -> Result<HandlerResponse, HandlerFault> {
        let method = request.method();
        match request.path() {
            INTAKE_PATH if method == Method::POST => self.accept_intake(request),
            INTAKE_QUERY_PATH if method == Method::GET => self.query_intake(request),
            ECHO_PATH => Ok(echo(request).into()),
            DELAY_PATH if method == Method::GET => Ok(delay(request)),
            FAULT_PATH => Err(HandlerFault::new(format!(
                "fault requested by driver via {} {}",
                method,
                request.path()
            ))),
            path => Ok(OutboundResponse::text(
                StatusCode::NOT_FOUND,
                format!("No scenario for {} {}", method, path),
            )
            .into()),
        }
    }

    fn before_loop_run(&self, ctx: &LoopContext) {
        tracing::info!(address = %ctx.local_addr, "Mock collector scenario ready");
    }
}

fn records_response(records: &[IntakeRecord]) -> OutboundResponse {
    OutboundResponse::json(StatusCode::OK, json!({ "records": records }))
}

fn echo(request: &InboundRequest) -> OutboundResponse {
    OutboundResponse::json(
        StatusCode::OK,
        json!({
            "method": request.method().as_str(),
            "path": request.path(),
            "query": request.query(),
            "body": String::from_utf8_lossy(request.body()),
            "request_id": request.request_id(),
        }),
    )
}

fn delay(request: &InboundRequest) -> HandlerResponse {
    let ms = match request.query_param("ms").map(str::parse::<u64>) {
        None => 0,
        Some(Ok(ms)) => ms.min(MAX_DELAY_MS),
        Some(Err(_)) => {
            return OutboundResponse::text(
                StatusCode::BAD_REQUEST,
                "`ms' must be a non-negative integer",
            )
            .into();
        }
    };

    DeferredResponse::from_future(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(OutboundResponse::json(StatusCode::OK, json!({ "delayed_ms": ms })))
    })
    .into()
}
