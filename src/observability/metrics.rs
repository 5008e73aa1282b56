//! Metrics collection and exposition.

use metrics::{counter, histogram};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record one processed RPC: count, wall time, and reply size.
pub fn record_rpc(method: &str, elapsed: Duration, response_bytes: usize) {
    counter!("rpc_requests_total", "method" => method.to_string()).increment(1);
    histogram!("rpc_request_duration_seconds").record(elapsed.as_secs_f64());
    histogram!("rpc_response_bytes").record(response_bytes as f64);
}

/// Record an admission refusal on the named port.
pub fn record_connection_refused(port: &str) {
    counter!("gateway_connections_refused_total", "port" => port.to_string()).increment(1);
}
