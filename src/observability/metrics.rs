//! Metrics collection and exposition.
//!
//! # Metrics
//! - `vein_requests_total` (counter): requests by kind (page, file, rejected) and status
//! - `vein_dispatch_total` (counter): controller dispatches by outcome
//!   (form, default, unhandled, error)
//! - `vein_page_forks_total` (counter): master pages forked into a worker

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(kind: &'static str, status: u16) {
    ::metrics::counter!("vein_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
}

pub fn record_dispatch(outcome: &'static str) {
    ::metrics::counter!("vein_dispatch_total", "outcome" => outcome).increment(1);
}

pub fn record_page_fork() {
    ::metrics::counter!("vein_page_forks_total").increment(1);
}
