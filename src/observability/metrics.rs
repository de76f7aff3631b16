//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dev_proxy_requests_total` (counter): requests by target kind and status
//! - `dev_proxy_request_duration_seconds` (histogram): latency by target kind
//! - `dev_proxy_forward_errors_total` (counter): failed forwards by error code
//! - `dev_proxy_route_reloads_total` (counter): completed route reloads
//! - `dev_proxy_routes` (gauge): routes in the current table, by method
//!
//! Recording is a no-op until an exporter is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::routing::{RouteTable, SUPPORTED_METHODS};

/// Install the Prometheus exporter listening on `addr`.
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(target_kind: &'static str, status: u16, start: Instant) {
    counter!(
        "dev_proxy_requests_total",
        "target" => target_kind,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("dev_proxy_request_duration_seconds", "target" => target_kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_forward_error(code: &'static str) {
    counter!("dev_proxy_forward_errors_total", "code" => code).increment(1);
}

pub fn record_reload(table: &RouteTable) {
    counter!("dev_proxy_route_reloads_total").increment(1);
    for method in SUPPORTED_METHODS.iter() {
        gauge!("dev_proxy_routes", "method" => method.as_str().to_string())
            .set(table.routes(method).len() as f64);
    }
}
