//! Dispatch metrics.
//!
//! # Metrics
//! - `harness_requests_total` (counter): requests by outcome
//! - `harness_dispatch_duration_seconds` (histogram): receipt to response
//! - `harness_deferred_pending` (gauge): deferred responses not yet settled

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const OUTCOME_IMMEDIATE: &str = "immediate";
pub const OUTCOME_DEFERRED: &str = "deferred";
pub const OUTCOME_DEFERRED_FAILED: &str = "deferred_failed";
pub const OUTCOME_REJECTED: &str = "rejected";
pub const OUTCOME_STATUS_CHECK: &str = "status_check";
pub const OUTCOME_FAULT: &str = "fault";

/// Expose metrics on a Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record a finished dispatch.
pub fn record_request(outcome: &'static str, start: Instant) {
    metrics::counter!("harness_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("harness_dispatch_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn deferred_started() {
    metrics::gauge!("harness_deferred_pending").increment(1.0);
}

pub fn deferred_settled() {
    metrics::gauge!("harness_deferred_pending").decrement(1.0);
}
