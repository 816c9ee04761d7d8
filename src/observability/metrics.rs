//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (bridges, bytes, quota)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `proxy_bridges_opened_total` (counter)
//! - `proxy_bridges_closed_total` (counter): by reason
//! - `proxy_active_bridges` (gauge): current bridge count
//! - `proxy_bytes_forwarded_total` (counter): by direction
//! - `proxy_filter_blocks_total` (counter)
//! - `proxy_quota_file_count` / `proxy_quota_data_size_bytes` (gauges)
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Every recorder call is a no-op until `init_metrics` installs an exporter

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::connection::Leg;

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_bridge_opened(active: usize) {
    counter!("proxy_bridges_opened_total").increment(1);
    gauge!("proxy_active_bridges").set(active as f64);
}

pub fn record_bridge_closed(reason: &'static str, active: usize) {
    counter!("proxy_bridges_closed_total", "reason" => reason).increment(1);
    gauge!("proxy_active_bridges").set(active as f64);
}

/// Bytes written to a handle on `to` leg.
pub fn record_bytes_forwarded(to: Leg, bytes: usize) {
    counter!("proxy_bytes_forwarded_total", "to" => to.as_str()).increment(bytes as u64);
}

pub fn record_filter_block() {
    counter!("proxy_filter_blocks_total").increment(1);
}

pub fn record_quota_file_count(files: u64) {
    gauge!("proxy_quota_file_count").set(files as f64);
}

pub fn record_quota_data_size(bytes: u64) {
    gauge!("proxy_quota_data_size_bytes").set(bytes as f64);
}
