//! Agent configuration

use crate::{AgentError, Result};
use gputel_driver::DriverBackend;
use gputel_export::{EmissionModel, ExportConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level agent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Scrape loop configuration
    pub scrape: ScrapeConfig,

    /// Export pipeline configuration
    pub export: ExportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Scrape loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Driver backend to sample from
    pub backend: DriverBackend,

    /// Emission model, selected once at startup
    pub emission: EmissionModel,

    /// Time between scrape ticks. Deployments run anywhere from 5s to 60s.
    pub interval: Duration,

    /// Upper bound on a single device query. `None` disables the bound and
    /// a stalled query blocks the remainder of its tick.
    pub query_timeout: Option<Duration>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            backend: DriverBackend::Nvml,
            emission: EmissionModel::Observer,
            interval: Duration::from_secs(20),
            query_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format ("pretty" or "json")
    pub format: String,

    /// Include the event's target module
    pub show_target: bool,

    /// Include thread ids
    pub show_thread_ids: bool,

    /// Include source line numbers
    pub show_line_numbers: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            show_target: true,
            show_thread_ids: false,
            show_line_numbers: false,
        }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Write configuration to a YAML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.scrape.interval.is_zero() {
            return Err(AgentError::Config(
                "scrape interval must be greater than zero".to_string(),
            ));
        }

        if let Some(timeout) = self.scrape.query_timeout {
            if timeout.is_zero() {
                return Err(AgentError::Config(
                    "query timeout must be greater than zero when set".to_string(),
                ));
            }
        }

        self.export.validate().map_err(AgentError::Config)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scrape.backend, DriverBackend::Nvml);
        assert_eq!(config.scrape.emission, EmissionModel::Observer);
        assert_eq!(config.scrape.interval, Duration::from_secs(20));
        assert_eq!(config.scrape.query_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = AgentConfig::default();
        config.scrape.interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_query_timeout_is_rejected() {
        let mut config = AgentConfig::default();
        config.scrape.query_timeout = Some(Duration::ZERO);
        assert!(config.validate().is_err());

        // Disabling the bound entirely is allowed
        config.scrape.query_timeout = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_export_config_is_rejected() {
        let mut config = AgentConfig::default();
        config.export.endpoint = String::new();
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
    }

    #[test]
    fn test_yaml_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gputel.yaml");

        let mut config = AgentConfig::default();
        config.scrape.emission = EmissionModel::Direct;
        config.scrape.interval = Duration::from_secs(5);
        config.export.endpoint = "collector:4317".to_string();
        config.to_file(&path).unwrap();

        let loaded = AgentConfig::from_file(&path).unwrap();
        assert_eq!(loaded.scrape.emission, EmissionModel::Direct);
        assert_eq!(loaded.scrape.interval, Duration::from_secs(5));
        assert_eq!(loaded.export.endpoint, "collector:4317");
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AgentConfig::from_file("/does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, AgentError::Io(_)));
    }
}
