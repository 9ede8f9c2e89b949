//! Metrics collection and exposition.
//!
//! # Metrics
//! - `receiver_requests_total` (counter): completed requests by method and status
//! - `receiver_request_duration_seconds` (histogram): request latency
//! - `receiver_connections_active` (gauge): connections being served
//! - `receiver_shutdowns_total` (counter): drains by outcome (graceful, forced)
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use axum::http::Method;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &Method, status: u16, latency: Duration) {
    ::metrics::counter!(
        "receiver_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("receiver_request_duration_seconds").record(latency.as_secs_f64());
}

pub fn record_connection_opened() {
    ::metrics::gauge!("receiver_connections_active").increment(1.0);
}

pub fn record_connection_closed() {
    ::metrics::gauge!("receiver_connections_active").decrement(1.0);
}

pub fn record_shutdown(outcome: &'static str) {
    ::metrics::counter!("receiver_shutdowns_total", "outcome" => outcome).increment(1);
}
