//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define pool metrics (desired vs. live workers, forks, exits, reloads)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `pool_workers_desired` (gauge): current desired worker count
//! - `pool_workers_active` (gauge): workers in the registry
//! - `pool_forks_total` (counter): fork attempts by outcome
//! - `pool_worker_exits_total` (counter): worker exits by cause
//! - `pool_reloads_total` (counter): rolling reloads by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Low-cardinality labels only (no worker ids)

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_pool_size(desired: usize, active: usize) {
    metrics::gauge!("pool_workers_desired").set(desired as f64);
    metrics::gauge!("pool_workers_active").set(active as f64);
}

pub fn record_fork(success: bool) {
    let outcome = if success { "ok" } else { "failed" };
    metrics::counter!("pool_forks_total", "outcome" => outcome).increment(1);
}

pub fn record_exit(cause: &'static str) {
    metrics::counter!("pool_worker_exits_total", "cause" => cause).increment(1);
}

pub fn record_reload(outcome: &'static str) {
    metrics::counter!("pool_reloads_total", "outcome" => outcome).increment(1);
}
