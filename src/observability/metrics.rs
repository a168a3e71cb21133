//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by operation and outcome
//! - `gateway_request_duration_seconds` (histogram): dispatch latency by operation
//! - `gateway_backend_connections_opened_total` (counter): backend dials that succeeded
//!
//! Without an installed recorder every update is a no-op.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_request(operation: &'static str, outcome: &'static str, start: Instant) {
    metrics::counter!("gateway_requests_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
