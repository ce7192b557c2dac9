//! Request metrics.
//!
//! The Prometheus exporter itself is installed by the bootstrap when
//! `METRICS_ADDR` is set; this module only records.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record one proxied request.
pub fn record_request(mode: &str, status: u16, duration: Duration) {
    let labels = [("mode", mode.to_string()), ("status", status.to_string())];

    counter!("sidecar_requests_total", &labels).increment(1);
    histogram!("sidecar_request_duration_seconds", &labels).record(duration.as_secs_f64());
}
