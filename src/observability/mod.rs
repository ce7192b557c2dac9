//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via tracing; level configured through `RUST_LOG`
//! - A UUID request id is attached to every request span
//! - Metrics are cheap counters/histograms; the Prometheus exporter is
//!   installed by the bootstrap only when an address is configured

pub mod logging;
pub mod metrics;
