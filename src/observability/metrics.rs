//! Metrics collection and exposition.
//!
//! # Metrics
//! - `minirest_compiles_total` (counter): compiles by outcome
//! - `minirest_table_writes_total` (counter): route table persists by outcome
//! - `minirest_routes` (gauge): patterns with a registered handler
//! - `minirest_requests_total` (counter): dispatched requests by method, status
//! - `minirest_request_duration_seconds` (histogram): handler latency
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is opt-in (`observability.metrics_enabled`)

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn outcome(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

pub fn record_compile(ok: bool) {
    counter!("minirest_compiles_total", "outcome" => outcome(ok)).increment(1);
}

pub fn record_table_write(ok: bool) {
    counter!("minirest_table_writes_total", "outcome" => outcome(ok)).increment(1);
}

pub fn record_route_count(count: usize) {
    gauge!("minirest_routes").set(count as f64);
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "minirest_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("minirest_request_duration_seconds").record(start.elapsed().as_secs_f64());
}
