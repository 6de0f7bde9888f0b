//! Mock driver for testing
//!
//! The mock shares its state behind an `Arc`, so tests keep a clone for
//! injection and inspection after handing the driver to the registry:
//! per-device status updates, query failure and delay injection, and
//! shutdown counting.

use crate::driver::DeviceDriver;
use crate::status::{DeviceInfo, DeviceStatus};
use crate::{DriverError, Result};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Mock GPU driver with injectable behavior
#[derive(Clone)]
pub struct MockDriver {
    inner: Arc<MockDriverInner>,
}

struct MockDriverInner {
    devices: RwLock<Vec<MockDevice>>,
    fail_enumeration: AtomicBool,
    fail_shutdown: AtomicBool,
    shutdowns: AtomicUsize,
}

struct MockDevice {
    info: DeviceInfo,
    status: RwLock<DeviceStatus>,
    failing: AtomicBool,
    query_delay: RwLock<Option<Duration>>,
    queries: AtomicUsize,
}

impl MockDriver {
    /// Create an empty mock driver
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MockDriverInner {
                devices: RwLock::new(Vec::new()),
                fail_enumeration: AtomicBool::new(false),
                fail_shutdown: AtomicBool::new(false),
                shutdowns: AtomicUsize::new(0),
            }),
        }
    }

    /// Create a mock driver pre-populated with `count` devices.
    ///
    /// The generated devices report temperature, power, memory and
    /// utilization but leave the PCIe and BAR1 fields absent, like older
    /// hardware does.
    pub fn with_default_devices(count: u32) -> Self {
        let mut driver = Self::new();
        for i in 0..count {
            driver = driver.with_device(
                format!("GPU-{}", uuid::Uuid::new_v4()),
                default_status(i),
            );
        }
        driver
    }

    /// Add a device with a fixed status snapshot
    pub fn with_device(self, uuid: impl Into<String>, status: DeviceStatus) -> Self {
        {
            let mut devices = self.inner.devices.write().unwrap();
            let index = devices.len() as u32;
            let uuid = uuid.into();
            devices.push(MockDevice {
                info: DeviceInfo {
                    index,
                    name: format!("Mock GPU {}", index),
                    uuid,
                },
                status: RwLock::new(status),
                failing: AtomicBool::new(false),
                query_delay: RwLock::new(None),
                queries: AtomicUsize::new(0),
            });
        }
        self
    }

    /// Replace the status snapshot a device reports
    pub fn set_status(&self, uuid: &str, status: DeviceStatus) {
        if let Some(device) = self.find(uuid) {
            *device
                .status
                .write()
                .unwrap_or_else(|e| e.into_inner()) = status;
        }
    }

    /// Make (or stop making) a device's status queries fail
    pub fn set_failing(&self, uuid: &str, failing: bool) {
        if let Some(device) = self.find(uuid) {
            device.failing.store(failing, Ordering::SeqCst);
        }
    }

    /// Delay every status query for a device, simulating a stalled sensor
    pub fn set_query_delay(&self, uuid: &str, delay: Option<Duration>) {
        if let Some(device) = self.find(uuid) {
            *device.query_delay.write().unwrap() = delay;
        }
    }

    /// Make device enumeration fail
    pub fn set_enumeration_failure(&self, failing: bool) {
        self.inner.fail_enumeration.store(failing, Ordering::SeqCst);
    }

    /// Make driver shutdown fail
    pub fn set_shutdown_failure(&self, failing: bool) {
        self.inner.fail_shutdown.store(failing, Ordering::SeqCst);
    }

    /// Number of times `shutdown` has been called
    pub fn shutdown_count(&self) -> usize {
        self.inner.shutdowns.load(Ordering::SeqCst)
    }

    /// Number of status queries issued for one device
    pub fn query_count(&self, uuid: &str) -> usize {
        self.find(uuid)
            .map(|d| d.queries.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Total status queries issued across all devices
    pub fn total_queries(&self) -> usize {
        self.inner
            .devices
            .read()
            .unwrap()
            .iter()
            .map(|d| d.queries.load(Ordering::SeqCst))
            .sum()
    }

    /// UUIDs in enumeration order
    pub fn device_uuids(&self) -> Vec<String> {
        self.inner
            .devices
            .read()
            .unwrap()
            .iter()
            .map(|d| d.info.uuid.clone())
            .collect()
    }

    fn find(&self, uuid: &str) -> Option<DeviceRef<'_>> {
        let devices = self.inner.devices.read().unwrap();
        let index = devices.iter().position(|d| d.info.uuid == uuid)?;
        Some(DeviceRef { devices, index })
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-guard wrapper so `find` can hand back one device from the list
struct DeviceRef<'a> {
    devices: std::sync::RwLockReadGuard<'a, Vec<MockDevice>>,
    index: usize,
}

impl std::ops::Deref for DeviceRef<'_> {
    type Target = MockDevice;

    fn deref(&self) -> &MockDevice {
        &self.devices[self.index]
    }
}

#[async_trait]
impl DeviceDriver for MockDriver {
    async fn device_count(&self) -> Result<u32> {
        if self.inner.fail_enumeration.load(Ordering::SeqCst) {
            return Err(DriverError::Enumeration(
                "simulated enumeration failure".to_string(),
            ));
        }
        Ok(self.inner.devices.read().unwrap().len() as u32)
    }

    async fn open_device(&self, index: u32) -> Result<DeviceInfo> {
        let devices = self.inner.devices.read().unwrap();
        devices
            .get(index as usize)
            .map(|d| d.info.clone())
            .ok_or_else(|| DriverError::Enumeration(format!("no device at index {}", index)))
    }

    async fn device_status(&self, index: u32) -> Result<DeviceStatus> {
        let (uuid, failing, delay) = {
            let devices = self.inner.devices.read().unwrap();
            let device = devices.get(index as usize).ok_or_else(|| {
                DriverError::query(format!("index {}", index), "device removed")
            })?;
            device.queries.fetch_add(1, Ordering::SeqCst);
            let triple = (
                device.info.uuid.clone(),
                device.failing.load(Ordering::SeqCst),
                *device.query_delay.read().unwrap(),
            );
            triple
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if failing {
            return Err(DriverError::query(uuid, "simulated query failure"));
        }

        let devices = self.inner.devices.read().unwrap();
        let status = devices[index as usize]
            .status
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        debug!(device = %uuid, "mock status query");
        Ok(status)
    }

    async fn shutdown(&self) -> Result<()> {
        self.inner.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.inner.fail_shutdown.load(Ordering::SeqCst) {
            return Err(DriverError::Shutdown(
                "simulated shutdown failure".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_status(index: u32) -> DeviceStatus {
    DeviceStatus {
        temperature_c: Some(65 + index * 5),
        power_mw: Some((150 + index * 25) * 1000),
        memory_used_mib: Some(2048 + index as u64 * 512),
        memory_free_mib: Some(6144 - index as u64 * 512),
        gpu_utilization_pct: Some(45 + index * 10),
        memory_utilization_pct: Some(30 + index * 8),
        decoder_utilization_ms: Some(167),
        encoder_utilization_ms: Some(167),
        pcie_rx_bytes: None,
        pcie_tx_bytes: None,
        bar1_used: None,
    }
}
