//! NVML (NVIDIA Management Library) backend

use crate::driver::DeviceDriver;
use crate::status::{DeviceInfo, DeviceStatus};
use crate::{DriverError, Result};

use async_trait::async_trait;
use nvml_wrapper::enum_wrappers::device::{PcieUtilCounter, TemperatureSensor};
use nvml_wrapper::{Device, Nvml};
use tokio::sync::RwLock;
use tracing::{debug, info};

const MIB: u64 = 1024 * 1024;

/// NVML-backed device driver.
///
/// Device handles borrow the library context, so the driver keeps only the
/// context and re-opens devices by index per query; the registry's cached
/// `DeviceInfo` is the stable identity. The context is held in an `Option`
/// so `shutdown` can release it while later callers get a defined error
/// instead of touching a dead driver.
pub struct NvmlDriver {
    nvml: RwLock<Option<Nvml>>,
}

impl NvmlDriver {
    /// Initialize NVML. Fails when the library or the kernel driver is
    /// unavailable.
    pub fn init() -> Result<Self> {
        let nvml = Nvml::init().map_err(|e| DriverError::Init(e.to_string()))?;
        info!("NVML initialized");
        Ok(Self {
            nvml: RwLock::new(Some(nvml)),
        })
    }
}

#[async_trait]
impl DeviceDriver for NvmlDriver {
    async fn device_count(&self) -> Result<u32> {
        let guard = self.nvml.read().await;
        let nvml = guard
            .as_ref()
            .ok_or_else(|| DriverError::Enumeration("driver already shut down".to_string()))?;
        nvml.device_count()
            .map_err(|e| DriverError::Enumeration(e.to_string()))
    }

    async fn open_device(&self, index: u32) -> Result<DeviceInfo> {
        let guard = self.nvml.read().await;
        let nvml = guard
            .as_ref()
            .ok_or_else(|| DriverError::Enumeration("driver already shut down".to_string()))?;
        let device = nvml
            .device_by_index(index)
            .map_err(|e| DriverError::Enumeration(e.to_string()))?;
        let uuid = device
            .uuid()
            .map_err(|e| DriverError::Enumeration(e.to_string()))?;
        let name = device
            .name()
            .map_err(|e| DriverError::Enumeration(e.to_string()))?;
        debug!(index, %uuid, %name, "opened NVML device");
        Ok(DeviceInfo { index, uuid, name })
    }

    async fn device_status(&self, index: u32) -> Result<DeviceStatus> {
        let guard = self.nvml.read().await;
        let nvml = guard.as_ref().ok_or_else(|| {
            DriverError::query(format!("index {}", index), "driver already shut down")
        })?;
        let device = nvml
            .device_by_index(index)
            .map_err(|e| DriverError::query(format!("index {}", index), e))?;
        Ok(read_status(&device))
    }

    async fn shutdown(&self) -> Result<()> {
        // nvml-wrapper releases the library in Drop; taking the context out
        // of the Option is the explicit shutdown point after which every
        // query path returns a defined error.
        let nvml = self.nvml.write().await.take();
        drop(nvml);
        info!("NVML shut down");
        Ok(())
    }
}

/// Read one snapshot, field by field.
///
/// Sensors vary by device generation and driver version. Each read is
/// independent and an unavailable field stays `None` — in particular the
/// PCIe throughput and BAR1 counters, which are absent on some boards.
fn read_status(device: &Device<'_>) -> DeviceStatus {
    let memory = device.memory_info().ok();
    let utilization = device.utilization_rates().ok();

    DeviceStatus {
        temperature_c: device.temperature(TemperatureSensor::Gpu).ok(),
        power_mw: device.power_usage().ok(),
        memory_used_mib: memory.as_ref().map(|m| m.used / MIB),
        memory_free_mib: memory.as_ref().map(|m| m.free / MIB),
        gpu_utilization_pct: utilization.as_ref().map(|u| u.gpu),
        memory_utilization_pct: utilization.as_ref().map(|u| u.memory),
        decoder_utilization_ms: device.decoder_utilization().ok().map(|u| u.utilization),
        encoder_utilization_ms: device.encoder_utilization().ok().map(|u| u.utilization),
        pcie_rx_bytes: device
            .pcie_throughput(PcieUtilCounter::Receive)
            .ok()
            .map(|kb| kb as u64 * 1024),
        pcie_tx_bytes: device
            .pcie_throughput(PcieUtilCounter::Send)
            .ok()
            .map(|kb| kb as u64 * 1024),
        bar1_used: device.bar1_memory_info().ok().map(|b| b.used),
    }
}
