//! Scrape scheduler
//!
//! Drives the periodic scrape cycle: on every tick, query each registered
//! device once and route every present status field into the metric sink.
//! One serial worker walks the devices; a failing device is skipped for
//! the tick and retried naturally on the next.
//!
//! Shutdown ordering is load-bearing and must not be reversed: stop the
//! timer, let an in-flight tick finish, shut the device driver down, then
//! signal completion. Only a successful driver shutdown reaches `Stopped`.

use crate::{AgentError, Result};
use gputel_driver::{DeviceRegistry, DeviceStatus, DriverError};
use gputel_export::{GpuMetric, MetricSink};

use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Scheduler lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// Everything a tick needs, owned by the scheduler.
///
/// The registry and the registered metric handles travel together into the
/// tick routine as explicit parameters; there is no process-wide metric
/// state to initialize in the right order.
pub struct ScrapeContext {
    pub registry: DeviceRegistry,
    pub sink: MetricSink,
}

/// Handle to a running scrape loop.
///
/// `stop` consumes the handle: stopping twice does not exist as a program.
/// Dropping the handle without calling `stop` also winds the loop down,
/// driver shutdown included.
pub struct ScrapeScheduler {
    state: watch::Receiver<SchedulerState>,
    stop_tx: oneshot::Sender<()>,
    done_rx: oneshot::Receiver<gputel_driver::Result<()>>,
}

impl ScrapeScheduler {
    /// Spawn the scrape loop.
    ///
    /// The first tick fires one full `interval` after start, never
    /// immediately; device enumeration and descriptor registration have
    /// already happened by the time this is called.
    pub fn start(
        interval: Duration,
        query_timeout: Option<Duration>,
        context: ScrapeContext,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(run_loop(
            interval,
            query_timeout,
            context,
            state_tx,
            stop_rx,
            done_tx,
        ));

        Self {
            state: state_rx,
            stop_tx,
            done_rx,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// A watch on the lifecycle state, usable after `stop` consumed the
    /// scheduler
    pub fn state_watch(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Stop the scrape loop and shut the device driver down.
    ///
    /// Stops the timer so no new tick starts, waits for an in-flight tick
    /// to finish (its successful partial results are kept), then shuts the
    /// driver down. Returns only once the completion signal has fired; a
    /// driver shutdown failure is fatal and surfaces here.
    pub async fn stop(self) -> Result<()> {
        let Self {
            state: _state,
            stop_tx,
            done_rx,
        } = self;

        // The loop may already be gone if the task was aborted; the
        // completion channel is the source of truth either way.
        let _ = stop_tx.send(());

        let shutdown = done_rx.await.map_err(|_| {
            AgentError::Scheduler("scrape loop terminated without completing".to_string())
        })?;
        shutdown.map_err(AgentError::from)
    }
}

async fn run_loop(
    interval: Duration,
    query_timeout: Option<Duration>,
    context: ScrapeContext,
    state: watch::Sender<SchedulerState>,
    mut stop_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<gputel_driver::Result<()>>,
) {
    state.send_replace(SchedulerState::Running);
    info!(interval = ?interval, devices = context.registry.devices().len(), "scrape loop running");

    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = ticker.tick() => {
                scrape_tick(&context, query_timeout).await;
            }
        }
    }

    state.send_replace(SchedulerState::Stopping);
    debug!("scrape timer stopped, shutting down device driver");

    match context.registry.shutdown().await {
        Ok(()) => {
            state.send_replace(SchedulerState::Stopped);
            info!("scrape loop stopped");
            let _ = done_tx.send(Ok(()));
        }
        Err(e) => {
            error!("device driver shutdown failed: {e}");
            let _ = done_tx.send(Err(e));
        }
    }
}

/// One scrape cycle across all registered devices.
///
/// Iterates the registry's device list, queries each device once and routes
/// every present field through the sink. A device failure is logged and
/// scoped to that device for this tick.
async fn scrape_tick(context: &ScrapeContext, query_timeout: Option<Duration>) {
    for device in context.registry.devices() {
        let status = match query_device(&context.registry, &device.uuid, query_timeout).await {
            Ok(status) => status,
            Err(e) => {
                warn!(device = %device.uuid, "device query failed, skipping for this tick: {e}");
                continue;
            }
        };

        for metric in GpuMetric::ALL {
            if let Some(value) = metric.sample(&status) {
                context.sink.record(&device.uuid, metric, value);
            }
        }
    }
}

async fn query_device(
    registry: &DeviceRegistry,
    uuid: &str,
    query_timeout: Option<Duration>,
) -> gputel_driver::Result<DeviceStatus> {
    match query_timeout {
        Some(limit) => match time::timeout(limit, registry.snapshot(uuid)).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Query {
                device: uuid.to_string(),
                reason: format!("query exceeded {:?} timeout", limit),
            }),
        },
        None => registry.snapshot(uuid).await,
    }
}
