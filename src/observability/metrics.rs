//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_total` (counter): dispatches by dispatch type and outcome
//! - `dispatch_duration_seconds` (histogram): time from resolve to outcome
//! - `dispatch_not_found_total` (counter): paths that resolved to no handler
//! - `chain_cache_misses_total` (counter): chains computed from the filter index
//! - `deployment_patterns` / `deployment_filters` (gauge): size of the live deployment
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels are static strings only

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::filter::DispatchType;

/// Install the Prometheus recorder with an HTTP scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch(dispatch: DispatchType, outcome: &'static str, started: Instant) {
    metrics::counter!(
        "dispatch_total",
        "dispatch" => dispatch.as_str(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("dispatch_duration_seconds", "dispatch" => dispatch.as_str())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_not_found(dispatch: DispatchType) {
    metrics::counter!("dispatch_not_found_total", "dispatch" => dispatch.as_str()).increment(1);
}

pub fn record_chain_cache_miss(dispatch: DispatchType) {
    metrics::counter!("chain_cache_misses_total", "dispatch" => dispatch.as_str()).increment(1);
}

pub fn record_deployment(patterns: usize, filters: usize) {
    metrics::gauge!("deployment_patterns").set(patterns as f64);
    metrics::gauge!("deployment_filters").set(filters as f64);
}
