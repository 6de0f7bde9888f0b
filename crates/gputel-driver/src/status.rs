//! Device identity and telemetry snapshot types

use serde::{Deserialize, Serialize};

/// Identity of one enumerated GPU device.
///
/// Created during registry initialization and alive for the process
/// lifetime. The UUID is assigned by the driver and is the stable key for
/// everything downstream (store cells, data point attributes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Enumeration index assigned by the driver
    pub index: u32,

    /// Driver-assigned UUID, e.g. `GPU-1f6a...`
    pub uuid: String,

    /// Product name, e.g. `NVIDIA A100-SXM4-80GB`
    pub name: String,
}

/// Immutable point-in-time telemetry snapshot for one device.
///
/// Every sub-field is optional: depending on device generation and driver
/// capability the sensor may be absent, and readers must never assume full
/// population. An absent field is skipped, never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// GPU core temperature in degrees Celsius
    pub temperature_c: Option<u32>,

    /// Power draw in milliwatts
    pub power_mw: Option<u32>,

    /// Framebuffer memory in use, MiB
    pub memory_used_mib: Option<u64>,

    /// Framebuffer memory free, MiB
    pub memory_free_mib: Option<u64>,

    /// GPU utilization, percent
    pub gpu_utilization_pct: Option<u32>,

    /// Memory bandwidth utilization, percent
    pub memory_utilization_pct: Option<u32>,

    /// Decoder utilization sample, ms
    pub decoder_utilization_ms: Option<u32>,

    /// Encoder utilization sample, ms
    pub encoder_utilization_ms: Option<u32>,

    /// PCIe receive throughput, bytes
    pub pcie_rx_bytes: Option<u64>,

    /// PCIe transmit throughput, bytes
    pub pcie_tx_bytes: Option<u64>,

    /// PCIe BAR1 memory in use
    pub bar1_used: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default_is_empty() {
        let status = DeviceStatus::default();
        assert!(status.temperature_c.is_none());
        assert!(status.power_mw.is_none());
        assert!(status.pcie_rx_bytes.is_none());
        assert!(status.bar1_used.is_none());
    }

    #[test]
    fn test_status_equality() {
        let a = DeviceStatus {
            temperature_c: Some(65),
            power_mw: Some(150_000),
            ..Default::default()
        };
        let b = a.clone();
        assert_eq!(a, b);

        let c = DeviceStatus {
            temperature_c: Some(66),
            ..a.clone()
        };
        assert_ne!(a, c);
    }
}
