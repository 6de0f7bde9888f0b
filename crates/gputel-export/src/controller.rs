//! OTLP export controller
//!
//! Thin lifecycle wrapper around the periodic OTLP push pipeline. The
//! pipeline flushes on its own cadence, decoupled from the scrape interval,
//! and owns transport concerns end to end - batching, retries and the wire
//! protocol are not this crate's business.

use crate::{ExportError, Result};

use opentelemetry::metrics::{Meter, MeterProvider};
use opentelemetry::KeyValue;
use opentelemetry_otlp::{MetricExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::{runtime, Resource};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Export pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Collector endpoint as `host:port`
    pub endpoint: String,

    /// Use plaintext transport instead of TLS
    pub insecure: bool,

    /// How often the pipeline pushes accumulated data points
    pub flush_interval: Duration,

    /// Per-export timeout
    pub timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:4317".to_string(),
            insecure: true,
            flush_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ExportConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.endpoint.is_empty() {
            return Err("export endpoint must not be empty".to_string());
        }
        if self.flush_interval.is_zero() {
            return Err("export flush interval must be greater than zero".to_string());
        }
        if self.timeout.is_zero() {
            return Err("export timeout must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Full OTLP endpoint URL, scheme chosen by the transport mode
    pub fn url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.clone();
        }
        let scheme = if self.insecure { "http" } else { "https" };
        format!("{}://{}", scheme, self.endpoint)
    }
}

/// Lifecycle handle for the OTLP push pipeline
pub struct ExportController {
    config: ExportConfig,
    provider: Option<SdkMeterProvider>,
}

impl ExportController {
    /// Create a controller; nothing is connected until [`start`] is called.
    ///
    /// [`start`]: ExportController::start
    pub fn new(config: ExportConfig) -> Self {
        Self {
            config,
            provider: None,
        }
    }

    /// Build the exporter, periodic reader and meter provider.
    pub fn start(&mut self) -> Result<()> {
        if self.provider.is_some() {
            return Err(ExportError::Config(
                "export pipeline already started".to_string(),
            ));
        }

        self.config.validate().map_err(ExportError::Config)?;

        let url = self.config.url();
        info!(endpoint = %url, flush_interval = ?self.config.flush_interval, "starting OTLP export pipeline");

        let exporter = MetricExporter::builder()
            .with_tonic()
            .with_endpoint(&url)
            .with_timeout(self.config.timeout)
            .build()
            .map_err(|e| ExportError::Pipeline(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter, runtime::Tokio)
            .with_interval(self.config.flush_interval)
            .build();

        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(Resource::new([KeyValue::new("service.name", "gputeld")]))
            .build();

        self.provider = Some(provider);
        Ok(())
    }

    /// The meter metric descriptors are registered against.
    ///
    /// Fails before [`start`]: descriptor registration must happen against
    /// a live pipeline.
    ///
    /// [`start`]: ExportController::start
    pub fn meter(&self) -> Result<Meter> {
        self.provider
            .as_ref()
            .map(|provider| provider.meter("gputel"))
            .ok_or_else(|| ExportError::Config("export pipeline not started".to_string()))
    }

    /// Flush and shut the pipeline down.
    ///
    /// A transport failure during the final flush is the pipeline's own
    /// problem; it is logged and not escalated.
    pub fn stop(&mut self) {
        if let Some(provider) = self.provider.take() {
            info!("stopping OTLP export pipeline");
            if let Err(e) = provider.shutdown() {
                warn!("error shutting down OTLP export pipeline: {e}");
            }
        }
    }

    /// Check if the pipeline is running
    pub fn is_started(&self) -> bool {
        self.provider.is_some()
    }

    /// Configured collector endpoint
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

impl Drop for ExportController {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            let _ = provider.shutdown();
        }
    }
}
