//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, backend failures, breaker events)
//! - Expose a Prometheus-compatible metrics endpoint
//! - Track per-route and per-backend metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): total requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_backend_failures_total` (counter): failed attempts by route, backend
//! - `gateway_backend_disabled_total` (counter): breaker trips by route, backend
//! - `gateway_backend_reactivated_total` (counter): reactivations by route, backend
//! - `gateway_forced_recovery_total` (counter): pools force-enabled, by route
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels for route, backend, status code

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram, Label};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics endpoint listening");
        }
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

fn describe() {
    describe_counter!("gateway_requests_total", "Requests served, by method, status and route");
    describe_histogram!(
        "gateway_request_duration_seconds",
        metrics::Unit::Seconds,
        "End-to-end request latency"
    );
    describe_counter!("gateway_backend_failures_total", "Failed forwarding attempts");
    describe_counter!("gateway_backend_disabled_total", "Backends disabled by the circuit breaker");
    describe_counter!("gateway_backend_reactivated_total", "Backends re-enabled by the reactivator");
    describe_counter!("gateway_forced_recovery_total", "Pools force-enabled because every backend was down");
}

pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    let labels = vec![
        Label::new("method", method.to_string()),
        Label::new("status", status.to_string()),
        Label::new("route", route.to_string()),
    ];
    counter!("gateway_requests_total", labels.clone()).increment(1);
    histogram!("gateway_request_duration_seconds", labels).record(started.elapsed().as_secs_f64());
}

pub fn record_backend_failure(route: &str, backend: &str) {
    counter!(
        "gateway_backend_failures_total",
        "route" => route.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_backend_disabled(route: &str, backend: &str) {
    counter!(
        "gateway_backend_disabled_total",
        "route" => route.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_backend_reactivated(route: &str, backend: &str) {
    counter!(
        "gateway_backend_reactivated_total",
        "route" => route.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_forced_recovery(route: &str) {
    counter!("gateway_forced_recovery_total", "route" => route.to_string()).increment(1);
}
