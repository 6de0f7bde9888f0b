//! # gputel-agent
//!
//! GPU telemetry agent (gputeld daemon) for gputel.
//!
//! Ties the device registry, the scrape scheduler and the OTLP export
//! pipeline together: enumerate devices, register metric descriptors, tick
//! on the configured interval, and shut the pieces down in the only safe
//! order.

pub mod agent;
pub mod config;
pub mod scheduler;

// Re-export commonly used types
pub use agent::Agent;
pub use config::AgentConfig;
pub use scheduler::{ScrapeContext, ScrapeScheduler, SchedulerState};

use gputel_driver::DriverError;
use gputel_export::ExportError;

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by the agent
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Initialize logging and tracing
pub fn init_logging(logging_config: &config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging_config.level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging_config.show_target)
        .with_thread_ids(logging_config.show_thread_ids)
        .with_line_number(logging_config.show_line_numbers);

    match logging_config.format.as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }

    Ok(())
}
