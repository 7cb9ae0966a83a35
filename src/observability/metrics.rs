//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define bridge metrics (requests, latency, route rebuilds, store churn)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `bridge_requests_total` (counter): requests by method, status, outcome
//! - `bridge_request_duration_seconds` (histogram): end-to-end latency
//! - `bridge_route_rebuilds_total` (counter): route table compilations
//! - `bridge_route_rebuild_duration_seconds` (histogram): compile time
//! - `bridge_routes` (gauge): routes in the current table
//! - `bridge_store_epoch` (gauge): latest store mutation epoch
//! - `bridge_watch_events_total` (counter): filesystem changes applied
//! - `bridge_materializations_total` (counter): scripts written to disk, by origin
//! - `bridge_render_value_errors_total` (counter): render values dropped
//!
//! # Design Decisions
//! - Recording is always safe; without an installed recorder it is a no-op
//! - Labels stay low-cardinality: never paths or parameter values

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

/// Record a finished request. `outcome` is one of `script`, `fallback`,
/// `not_found`, `bad_request`, `error`.
pub fn record_request(method: &str, status: u16, outcome: &'static str, start: Instant) {
    let status = status.to_string();
    metrics::counter!(
        "bridge_requests_total",
        "method" => method.to_string(),
        "status" => status,
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("bridge_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_rebuild(routes: usize, start: Instant) {
    metrics::counter!("bridge_route_rebuilds_total").increment(1);
    metrics::histogram!("bridge_route_rebuild_duration_seconds")
        .record(start.elapsed().as_secs_f64());
    metrics::gauge!("bridge_routes").set(routes as f64);
}

pub fn record_store_epoch(epoch: u64) {
    metrics::gauge!("bridge_store_epoch").set(epoch as f64);
}

pub fn record_watch_events(applied: usize) {
    metrics::counter!("bridge_watch_events_total").increment(applied as u64);
}

pub fn record_materialization(origin: &'static str) {
    metrics::counter!("bridge_materializations_total", "origin" => origin).increment(1);
}

pub fn record_render_value_error() {
    metrics::counter!("bridge_render_value_errors_total").increment(1);
}
