//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher and handlers produce:
//!     → logging.rs (structured log events, `harness` span per loop)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON), read by the driver's log collection
//!     → Prometheus scrape (optional)
//! ```
//!
//! # Design Decisions
//! - Every dispatch log line carries the request ID and test env ID
//! - Metrics are cheap and off the request path's critical section

pub mod logging;
pub mod metrics;
