//! Metrics collection and exposition.
//!
//! # Metrics
//! - `sidecar_admission_total` (counter): admission reviews by outcome
//! - `sidecar_reload_total` (counter): reload attempts by result
//! - `sidecar_health_write_failures_total` (counter): failed heartbeat writes
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus exporter is optional and started only from `main`

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

pub const OUTCOME_PATCHED: &str = "patched";
pub const OUTCOME_SKIPPED: &str = "skipped";
pub const OUTCOME_ERROR: &str = "error";
pub const OUTCOME_INVALID: &str = "invalid";

pub const RELOAD_SUCCESS: &str = "success";
pub const RELOAD_FAILURE: &str = "failure";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_admission(outcome: &'static str) {
    counter!("sidecar_admission_total", "outcome" => outcome).increment(1);
}

pub fn record_reload(result: &'static str) {
    counter!("sidecar_reload_total", "result" => result).increment(1);
}

pub fn record_health_write_failure() {
    counter!("sidecar_health_write_failures_total").increment(1);
}
