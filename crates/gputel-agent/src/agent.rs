//! Core agent implementation

use crate::config::AgentConfig;
use crate::scheduler::{ScrapeContext, ScrapeScheduler};
use crate::Result;
use gputel_driver::{create_driver, DeviceRegistry};
use gputel_export::{ExportController, MetricSink, ObservedValueStore};

use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// The GPU telemetry agent.
///
/// Startup order is mandatory: device enumeration and metric descriptor
/// registration complete before the scheduler's first tick can fire.
/// Shutdown runs the other way: the scheduler drains and shuts the driver
/// down before the export pipeline is stopped.
pub struct Agent {
    config: AgentConfig,
    export: ExportController,
    scheduler: Option<ScrapeScheduler>,
}

impl Agent {
    /// Create a new agent with the given configuration
    pub fn new(config: AgentConfig) -> Self {
        let export = ExportController::new(config.export.clone());
        Self {
            config,
            export,
            scheduler: None,
        }
    }

    /// Start the agent: driver, export pipeline, then scheduler.
    ///
    /// Any failure here is fatal; the process has nothing useful to do
    /// without its devices or its pipeline.
    pub async fn start(&mut self) -> Result<()> {
        info!("starting gputel agent");
        self.config.validate()?;

        let driver = create_driver(self.config.scrape.backend)?;
        let registry = DeviceRegistry::initialize(driver).await?;

        self.export.start()?;
        let meter = self.export.meter()?;

        let store = Arc::new(ObservedValueStore::new(
            registry.devices().iter().map(|d| d.uuid.clone()),
        ));
        let sink = MetricSink::new(self.config.scrape.emission, &meter, store);

        self.scheduler = Some(ScrapeScheduler::start(
            self.config.scrape.interval,
            self.config.scrape.query_timeout,
            ScrapeContext { registry, sink },
        ));

        info!(
            backend = %self.config.scrape.backend,
            model = %self.config.scrape.emission,
            interval = ?self.config.scrape.interval,
            "gputel agent started"
        );
        Ok(())
    }

    /// Stop the agent: scheduler (timer, in-flight tick, driver shutdown,
    /// completion signal), then the export pipeline.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping gputel agent");

        if let Some(scheduler) = self.scheduler.take() {
            scheduler.stop().await?;
        }

        self.export.stop();

        info!("gputel agent stopped");
        Ok(())
    }

    /// Run the agent until a termination signal arrives
    pub async fn run(&mut self) -> Result<()> {
        self.start().await?;

        wait_for_termination().await;

        self.stop().await
    }

    /// Get the agent configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Check if the scrape loop is running
    pub fn is_running(&self) -> bool {
        self.scheduler.is_some()
    }
}

/// Wait for termination signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            error!("failed to install SIGTERM handler: {e}");
            let _ = signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM");
        }
        _ = signal::ctrl_c() => {
            info!("received SIGINT");
        }
    }
}

/// Wait for termination signals (non-Unix: Ctrl+C only)
#[cfg(not(unix))]
async fn wait_for_termination() {
    let _ = signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gputel_driver::DriverBackend;
    use gputel_export::EmissionModel;
    use std::time::Duration;

    fn test_config(emission: EmissionModel) -> AgentConfig {
        let mut config = AgentConfig::default();
        config.scrape.backend = DriverBackend::Mock;
        config.scrape.emission = emission;
        config.scrape.interval = Duration::from_millis(50);
        // Keep the pipeline from pushing to a collector that isn't there
        config.export.flush_interval = Duration::from_secs(3600);
        config.export.timeout = Duration::from_secs(1);
        config
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_agent_lifecycle_observer_model() {
        let mut agent = Agent::new(test_config(EmissionModel::Observer));
        assert!(!agent.is_running());

        agent.start().await.unwrap();
        assert!(agent.is_running());

        // A couple of ticks against the mock devices
        tokio::time::sleep(Duration::from_millis(120)).await;

        agent.stop().await.unwrap();
        assert!(!agent.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_agent_lifecycle_direct_model() {
        let mut agent = Agent::new(test_config(EmissionModel::Direct));
        agent.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;
        agent.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stop_without_start_is_clean() {
        let mut agent = Agent::new(test_config(EmissionModel::Observer));
        agent.stop().await.unwrap();
        assert!(!agent.is_running());
    }

    #[tokio::test]
    async fn test_invalid_config_fails_start() {
        let mut config = test_config(EmissionModel::Observer);
        config.scrape.interval = Duration::ZERO;

        let mut agent = Agent::new(config);
        assert!(agent.start().await.is_err());
        assert!(!agent.is_running());
    }

    #[test]
    fn test_config_access() {
        let config = test_config(EmissionModel::Direct);
        let agent = Agent::new(config);
        assert_eq!(agent.config().scrape.emission, EmissionModel::Direct);
        assert_eq!(agent.config().scrape.backend, DriverBackend::Mock);
    }
}
