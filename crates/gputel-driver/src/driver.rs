//! Driver capability trait and backend selection

use crate::status::{DeviceInfo, DeviceStatus};
use crate::{DriverError, Result};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capability over the native GPU management library.
///
/// The binding layer is opaque to the rest of the system: everything above
/// this trait sees devices only as enumeration indexes and UUIDs. Fallible
/// construction (driver init) lives on the concrete backends; a constructed
/// driver is ready for enumeration.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    /// Number of devices visible to the driver
    async fn device_count(&self) -> Result<u32>;

    /// Open the device at `index` and return its identity
    async fn open_device(&self, index: u32) -> Result<DeviceInfo>;

    /// Query a point-in-time status snapshot for the device at `index`
    async fn device_status(&self, index: u32) -> Result<DeviceStatus>;

    /// Release all driver resources.
    ///
    /// Querying a device after shutdown is undefined in the underlying
    /// driver and must never happen; the registry enforces this by owning
    /// the only reference.
    async fn shutdown(&self) -> Result<()>;
}

/// Available driver backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverBackend {
    /// NVIDIA Management Library
    Nvml,
    /// Mock backend for testing
    Mock,
}

impl std::fmt::Display for DriverBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverBackend::Nvml => write!(f, "nvml"),
            DriverBackend::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for DriverBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nvml" => Ok(DriverBackend::Nvml),
            "mock" => Ok(DriverBackend::Mock),
            _ => Err(format!("unknown driver backend: {}", s)),
        }
    }
}

/// Create a backend-specific driver.
///
/// Fails with [`DriverError::Init`] when the underlying library cannot be
/// loaded, and [`DriverError::UnsupportedBackend`] when the backend is not
/// compiled in.
pub fn create_driver(backend: DriverBackend) -> Result<Box<dyn DeviceDriver>> {
    match backend {
        #[cfg(feature = "nvml")]
        DriverBackend::Nvml => {
            let driver = crate::nvml::NvmlDriver::init()?;
            Ok(Box::new(driver))
        }

        #[cfg(any(feature = "mock", test))]
        DriverBackend::Mock => {
            let driver = crate::mock::MockDriver::with_default_devices(2);
            Ok(Box::new(driver))
        }

        #[allow(unreachable_patterns)]
        _ => Err(DriverError::UnsupportedBackend(backend.to_string())),
    }
}
