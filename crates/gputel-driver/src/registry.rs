//! Device registry: owns the driver and the enumerated devices

use crate::driver::DeviceDriver;
use crate::status::{DeviceInfo, DeviceStatus};
use crate::{DriverError, Result};

use std::collections::HashMap;
use tracing::info;

/// Owns the device driver and the set of devices enumerated at startup.
///
/// The device set is fixed for the process lifetime: enumeration happens
/// once in [`DeviceRegistry::initialize`], and the registry is the only
/// holder of the driver. [`DeviceRegistry::shutdown`] consumes the
/// registry, so no snapshot can be requested after the driver is gone.
pub struct DeviceRegistry {
    driver: Box<dyn DeviceDriver>,
    devices: Vec<DeviceInfo>,
    by_uuid: HashMap<String, u32>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.devices)
            .field("by_uuid", &self.by_uuid)
            .finish_non_exhaustive()
    }
}

impl DeviceRegistry {
    /// Enumerate all devices and build the registry.
    ///
    /// Any failure here is fatal: a telemetry agent that cannot see its
    /// devices has nothing to do.
    pub async fn initialize(driver: Box<dyn DeviceDriver>) -> Result<Self> {
        let count = driver.device_count().await?;
        info!("found {} GPU devices", count);

        let mut devices = Vec::with_capacity(count as usize);
        let mut by_uuid = HashMap::with_capacity(count as usize);
        for index in 0..count {
            let device = driver.open_device(index).await?;
            by_uuid.insert(device.uuid.clone(), index);
            devices.push(device);
        }

        Ok(Self {
            driver,
            devices,
            by_uuid,
        })
    }

    /// Enumerated devices, in driver index order
    pub fn devices(&self) -> &[DeviceInfo] {
        &self.devices
    }

    /// Query a point-in-time status snapshot for one device.
    ///
    /// Failure is scoped to this device and this call; the caller skips the
    /// device for the current tick.
    pub async fn snapshot(&self, uuid: &str) -> Result<DeviceStatus> {
        let index = *self
            .by_uuid
            .get(uuid)
            .ok_or_else(|| DriverError::query(uuid, "unknown device"))?;
        self.driver.device_status(index).await
    }

    /// Release all driver resources.
    ///
    /// Consumes the registry: the type system guarantees no device query
    /// can race or follow driver shutdown.
    pub async fn shutdown(self) -> Result<()> {
        self.driver.shutdown().await
    }
}
