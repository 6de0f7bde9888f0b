//! # gputel-driver
//!
//! GPU device enumeration and telemetry snapshots for gputel.
//!
//! This crate provides:
//! - A [`DeviceDriver`] capability trait over the native driver binding
//! - An NVML-backed driver (`nvml` feature) and a mock driver for testing
//! - A [`DeviceRegistry`] that owns the enumerated devices and exposes
//!   point-in-time [`DeviceStatus`] snapshots
//!
//! ## Example
//!
//! ```no_run
//! use gputel_driver::{create_driver, DeviceRegistry, DriverBackend};
//!
//! #[tokio::main]
//! async fn main() -> gputel_driver::Result<()> {
//!     let driver = create_driver(DriverBackend::Nvml)?;
//!     let registry = DeviceRegistry::initialize(driver).await?;
//!     println!("found {} GPU devices", registry.devices().len());
//!
//!     for device in registry.devices().to_vec() {
//!         let status = registry.snapshot(&device.uuid).await?;
//!         println!("{}: {:?}", device.uuid, status.temperature_c);
//!     }
//!
//!     registry.shutdown().await?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

pub mod driver;
pub mod registry;
pub mod status;

// Backend-specific modules
#[cfg(feature = "nvml")]
pub mod nvml;

// Mock implementation for testing
#[cfg(any(feature = "mock", test))]
pub mod mock;

// Re-export main types
pub use driver::{create_driver, DeviceDriver, DriverBackend};
pub use registry::DeviceRegistry;
pub use status::{DeviceInfo, DeviceStatus};

/// Result type for driver operations
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors that can occur while talking to the device driver
#[derive(Error, Debug)]
pub enum DriverError {
    /// The underlying driver could not be initialized. Fatal.
    #[error("driver initialization failed: {0}")]
    Init(String),

    /// Device enumeration failed during startup. Fatal.
    #[error("device enumeration failed: {0}")]
    Enumeration(String),

    /// A status query for one device failed. Recoverable: the caller skips
    /// the device for the current tick and retries naturally on the next.
    #[error("device query failed for {device}: {reason}")]
    Query { device: String, reason: String },

    /// Driver shutdown failed. Fatal: further driver use is undefined.
    #[error("driver shutdown failed: {0}")]
    Shutdown(String),

    /// The requested backend is not compiled in or not supported.
    #[error("driver backend not supported: {0}")]
    UnsupportedBackend(String),
}

impl DriverError {
    /// Check if this error must terminate the process.
    ///
    /// Only per-device query failures are recoverable; everything touching
    /// driver lifecycle is fatal.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DriverError::Query { .. })
    }

    pub(crate) fn query(device: impl Into<String>, reason: impl ToString) -> Self {
        DriverError::Query {
            device: device.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(DriverError::Init("no driver".to_string()).is_fatal());
        assert!(DriverError::Enumeration("lost device".to_string()).is_fatal());
        assert!(DriverError::Shutdown("busy".to_string()).is_fatal());
        assert!(DriverError::UnsupportedBackend("rocm".to_string()).is_fatal());

        let query = DriverError::query("GPU-0", "transient read failure");
        assert!(!query.is_fatal());
    }

    #[test]
    fn test_error_display() {
        let error = DriverError::query("GPU-abc", "device removed");
        assert_eq!(
            error.to_string(),
            "device query failed for GPU-abc: device removed"
        );

        let error = DriverError::Init("libnvidia-ml not found".to_string());
        assert_eq!(
            error.to_string(),
            "driver initialization failed: libnvidia-ml not found"
        );
    }
}
