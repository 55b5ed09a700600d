//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_requests_total` (counter): dispatched requests by route, method, status
//! - `rpc_request_duration_seconds` (histogram): dispatch latency by route, method
//! - `rpc_binding_failures_total` (counter): requests rejected while binding, by route
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Unmatched requests share the `unmatched` route label so label cardinality
//!   stays bounded by the route table

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

pub const REQUESTS_TOTAL: &str = "rpc_requests_total";
pub const REQUEST_DURATION: &str = "rpc_request_duration_seconds";
pub const BINDING_FAILURES: &str = "rpc_binding_failures_total";

/// Route label for requests that matched no route.
pub const UNMATCHED: &str = "unmatched";

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    let counted = [
        ("route", route.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    let timed = [("route", route.to_string()), ("method", method.to_string())];
    metrics::counter!(REQUESTS_TOTAL, &counted).increment(1);
    metrics::histogram!(REQUEST_DURATION, &timed).record(start.elapsed().as_secs_f64());
}

pub fn record_binding_failure(route: &str) {
    metrics::counter!(BINDING_FAILURES, "route" => route.to_string()).increment(1);
}
