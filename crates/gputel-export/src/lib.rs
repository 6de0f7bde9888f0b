//! # gputel-export
//!
//! Metric emission for gputel - catalog, observed value store and the OTLP
//! push pipeline.
//!
//! This crate provides:
//! - The static metric catalog ([`GpuMetric`]): names, units, descriptions
//!   and field extraction from device status snapshots
//! - The [`ObservedValueStore`]: latest sampled value per (device, metric)
//!   under fine-grained per-cell locking
//! - The [`MetricSink`] emission adapter with its two models,
//!   [`ObserverSink`] (read at export time) and [`DirectRecordSink`]
//!   (emitted at scrape time)
//! - The [`ExportController`] wrapping the periodic OTLP push pipeline

pub mod catalog;
pub mod controller;
pub mod sink;
pub mod store;

// Re-export commonly used types
pub use catalog::GpuMetric;
pub use controller::{ExportConfig, ExportController};
pub use sink::{DirectRecordSink, EmissionModel, MetricSink, ObserverSink};
pub use store::ObservedValueStore;

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Errors raised by the export layer.
///
/// Transport failures inside the OTLP pipeline are not represented here;
/// the pipeline owns its own retry policy and the final-flush error path is
/// logged, not escalated.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export configuration error: {0}")]
    Config(String),

    #[error("export pipeline error: {0}")]
    Pipeline(String),
}
