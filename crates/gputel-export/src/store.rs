//! Observed value store
//!
//! Latest sampled value per (device, metric). The scraper writes each cell
//! once per tick; export callbacks read arbitrarily often from the flush
//! loop. Locking is per cell, so unrelated devices and metrics never
//! contend, and a reader racing a writer sees either the previous tick's
//! value or the new one - never a torn value. Staleness of at most one tick
//! is by contract acceptable.

use crate::catalog::GpuMetric;

use parking_lot::RwLock;
use std::collections::HashMap;

/// One mutable cell, guarded by its own read/write lock.
///
/// `None` until the first successful sample: a flush that runs before the
/// first tick finds nothing to emit.
#[derive(Debug, Default)]
pub struct ObservedValue {
    value: RwLock<Option<i64>>,
}

impl ObservedValue {
    /// Atomically replace the cell's value
    pub fn set(&self, value: i64) {
        *self.value.write() = Some(value);
    }

    /// Read the latest committed value
    pub fn get(&self) -> Option<i64> {
        *self.value.read()
    }
}

/// Cells for the full metric catalog of every enumerated device.
///
/// The cell map is built once, before the scheduler starts, and never
/// changes shape afterwards; only cell contents move.
pub struct ObservedValueStore {
    devices: Vec<String>,
    cells: HashMap<String, HashMap<GpuMetric, ObservedValue>>,
}

impl ObservedValueStore {
    /// Create cells for every (device, metric) pair
    pub fn new<I, S>(devices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let devices: Vec<String> = devices.into_iter().map(Into::into).collect();
        let cells = devices
            .iter()
            .map(|device| {
                let metrics = GpuMetric::ALL
                    .iter()
                    .map(|metric| (*metric, ObservedValue::default()))
                    .collect();
                (device.clone(), metrics)
            })
            .collect();

        Self { devices, cells }
    }

    /// Replace the latest value for one (device, metric) cell.
    ///
    /// Unknown pairs are ignored; cells exist for every enumerated device
    /// and the whole catalog, so a miss means the device was never
    /// enumerated.
    pub fn set(&self, device: &str, metric: GpuMetric, value: i64) {
        if let Some(cell) = self.cells.get(device).and_then(|m| m.get(&metric)) {
            cell.set(value);
        }
    }

    /// Latest committed value for one (device, metric) cell
    pub fn get(&self, device: &str, metric: GpuMetric) -> Option<i64> {
        self.cells
            .get(device)
            .and_then(|m| m.get(&metric))
            .and_then(ObservedValue::get)
    }

    /// Device ids in enumeration order, for export callbacks
    pub fn device_ids(&self) -> &[String] {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_returns_last_set_value() {
        let store = ObservedValueStore::new(["GPU-a"]);

        assert_eq!(store.get("GPU-a", GpuMetric::Temperature), None);

        store.set("GPU-a", GpuMetric::Temperature, 65);
        assert_eq!(store.get("GPU-a", GpuMetric::Temperature), Some(65));

        store.set("GPU-a", GpuMetric::Temperature, 67);
        assert_eq!(store.get("GPU-a", GpuMetric::Temperature), Some(67));
    }

    #[test]
    fn test_cells_are_independent() {
        let store = ObservedValueStore::new(["GPU-a", "GPU-b"]);

        store.set("GPU-a", GpuMetric::Temperature, 65);
        store.set("GPU-b", GpuMetric::Temperature, 70);
        store.set("GPU-a", GpuMetric::PowerUsage, 150_000);

        assert_eq!(store.get("GPU-a", GpuMetric::Temperature), Some(65));
        assert_eq!(store.get("GPU-b", GpuMetric::Temperature), Some(70));
        assert_eq!(store.get("GPU-a", GpuMetric::PowerUsage), Some(150_000));
        assert_eq!(store.get("GPU-b", GpuMetric::PowerUsage), None);
    }

    #[test]
    fn test_unknown_device_is_a_noop() {
        let store = ObservedValueStore::new(["GPU-a"]);
        store.set("GPU-unknown", GpuMetric::Temperature, 65);
        assert_eq!(store.get("GPU-unknown", GpuMetric::Temperature), None);
    }

    #[test]
    fn test_device_ids_keep_enumeration_order() {
        let store = ObservedValueStore::new(["GPU-b", "GPU-a", "GPU-c"]);
        assert_eq!(store.device_ids(), ["GPU-b", "GPU-a", "GPU-c"]);
    }

    #[test]
    fn test_concurrent_writer_and_reader() {
        let store = Arc::new(ObservedValueStore::new(["GPU-a"]));

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 1..=1000 {
                    store.set("GPU-a", GpuMetric::Temperature, i);
                }
            })
        };

        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    // Every read observes a fully committed value
                    if let Some(v) = store.get("GPU-a", GpuMetric::Temperature) {
                        assert!((1..=1000).contains(&v));
                    }
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(store.get("GPU-a", GpuMetric::Temperature), Some(1000));
    }
}
