//! Static metric catalog
//!
//! One descriptor per exported metric: name, unit and description are fixed
//! at compile time and registered with the meter exactly once at startup.
//! Values pass through in the unit of the underlying sensor; nothing here
//! converts or aggregates.

use gputel_driver::DeviceStatus;

/// The exported metric catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuMetric {
    Temperature,
    PowerUsage,
    MemoryUsed,
    MemoryFree,
    GpuUtilization,
    MemoryUtilization,
    DecoderUtilization,
    EncoderUtilization,
    PcieThroughputRx,
    PcieThroughputTx,
    PcieBar1Used,
}

impl GpuMetric {
    /// Every metric in the catalog, in registration order
    pub const ALL: [GpuMetric; 11] = [
        GpuMetric::Temperature,
        GpuMetric::PowerUsage,
        GpuMetric::MemoryUsed,
        GpuMetric::MemoryFree,
        GpuMetric::GpuUtilization,
        GpuMetric::MemoryUtilization,
        GpuMetric::DecoderUtilization,
        GpuMetric::EncoderUtilization,
        GpuMetric::PcieThroughputRx,
        GpuMetric::PcieThroughputTx,
        GpuMetric::PcieBar1Used,
    ];

    /// Instrument name
    pub fn name(&self) -> &'static str {
        match self {
            GpuMetric::Temperature => "gpu/temperature",
            GpuMetric::PowerUsage => "gpu/powerusage",
            GpuMetric::MemoryUsed => "gpu/memoryused",
            GpuMetric::MemoryFree => "gpu/memoryfree",
            GpuMetric::GpuUtilization => "gpu/utilization",
            GpuMetric::MemoryUtilization => "gpu/memoryutilization",
            GpuMetric::DecoderUtilization => "gpu/decoderutilization",
            GpuMetric::EncoderUtilization => "gpu/encoderutilization",
            GpuMetric::PcieThroughputRx => "gpu/pciethroughputrx",
            GpuMetric::PcieThroughputTx => "gpu/pciethroughputtx",
            GpuMetric::PcieBar1Used => "gpu/pciebar1used",
        }
    }

    /// Unit of the underlying sensor
    pub fn unit(&self) -> &'static str {
        match self {
            GpuMetric::Temperature => "C",
            GpuMetric::PowerUsage => "mW",
            GpuMetric::MemoryUsed | GpuMetric::MemoryFree => "MiB",
            GpuMetric::GpuUtilization | GpuMetric::MemoryUtilization => "%",
            GpuMetric::DecoderUtilization | GpuMetric::EncoderUtilization => "ms",
            GpuMetric::PcieThroughputRx | GpuMetric::PcieThroughputTx => "bytes",
            GpuMetric::PcieBar1Used => "count",
        }
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            GpuMetric::Temperature => "GPU temperature",
            GpuMetric::PowerUsage => "GPU power usage",
            GpuMetric::MemoryUsed => "GPU framebuffer memory used",
            GpuMetric::MemoryFree => "GPU framebuffer memory free",
            GpuMetric::GpuUtilization => "GPU utilization",
            GpuMetric::MemoryUtilization => "GPU memory utilization",
            GpuMetric::DecoderUtilization => "GPU decoder utilization",
            GpuMetric::EncoderUtilization => "GPU encoder utilization",
            GpuMetric::PcieThroughputRx => "PCIe receive throughput",
            GpuMetric::PcieThroughputTx => "PCIe transmit throughput",
            GpuMetric::PcieBar1Used => "PCIe BAR1 memory used",
        }
    }

    /// Extract this metric's value from a status snapshot.
    ///
    /// Returns `None` when the device did not report the field; the sample
    /// is skipped for the tick, never defaulted.
    pub fn sample(&self, status: &DeviceStatus) -> Option<i64> {
        match self {
            GpuMetric::Temperature => status.temperature_c.map(i64::from),
            GpuMetric::PowerUsage => status.power_mw.map(i64::from),
            GpuMetric::MemoryUsed => status.memory_used_mib.map(|v| v as i64),
            GpuMetric::MemoryFree => status.memory_free_mib.map(|v| v as i64),
            GpuMetric::GpuUtilization => status.gpu_utilization_pct.map(i64::from),
            GpuMetric::MemoryUtilization => status.memory_utilization_pct.map(i64::from),
            GpuMetric::DecoderUtilization => status.decoder_utilization_ms.map(i64::from),
            GpuMetric::EncoderUtilization => status.encoder_utilization_ms.map(i64::from),
            GpuMetric::PcieThroughputRx => status.pcie_rx_bytes.map(|v| v as i64),
            GpuMetric::PcieThroughputTx => status.pcie_tx_bytes.map(|v| v as i64),
            GpuMetric::PcieBar1Used => status.bar1_used.map(|v| v as i64),
        }
    }
}

impl std::fmt::Display for GpuMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
