//! Metric emission adapter
//!
//! One sink, two emission models, selected once at construction:
//!
//! - **Observer**: one observable gauge per catalog metric; the export
//!   pipeline invokes the callbacks at its own flush cadence and each
//!   callback reads the current store cell for every device.
//! - **Direct record**: one gauge per catalog metric; a data point is
//!   emitted synchronously at scrape time and the pipeline batches on its
//!   own timer.
//!
//! Both models tag every data point with a `device` attribute and pass
//! values through unconverted.

use crate::catalog::GpuMetric;
use crate::store::ObservedValueStore;

use opentelemetry::metrics::{AsyncInstrument, Gauge, Meter, ObservableGauge};
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Which emission model a sink uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmissionModel {
    /// Read stored values on demand at export time
    Observer,
    /// Emit synchronously at scrape time
    Direct,
}

impl std::fmt::Display for EmissionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmissionModel::Observer => write!(f, "observer"),
            EmissionModel::Direct => write!(f, "direct"),
        }
    }
}

impl std::str::FromStr for EmissionModel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "observer" => Ok(EmissionModel::Observer),
            "direct" => Ok(EmissionModel::Direct),
            _ => Err(format!("unknown emission model: {}", s)),
        }
    }
}

/// Emission adapter holding the metric handles registered at startup.
///
/// [`MetricSink::record`] is the single entry point the scrape loop calls;
/// under the observer model it is a store write, under the direct model a
/// synchronous emission.
pub enum MetricSink {
    Observer(ObserverSink),
    Direct(DirectRecordSink),
}

/// Observer-model sink: observable gauges over the value store
pub struct ObserverSink {
    store: Arc<ObservedValueStore>,
    // Keeps the instrument registrations alive for the sink's lifetime
    _instruments: Vec<ObservableGauge<i64>>,
}

/// Direct-record sink: synchronous gauges, no shared state
pub struct DirectRecordSink {
    gauges: HashMap<GpuMetric, Gauge<i64>>,
}

impl MetricSink {
    /// Build the sink for `model`, registering every catalog descriptor
    /// with the meter exactly once.
    pub fn new(model: EmissionModel, meter: &Meter, store: Arc<ObservedValueStore>) -> Self {
        match model {
            EmissionModel::Observer => Self::observer(meter, store),
            EmissionModel::Direct => Self::direct(meter),
        }
    }

    /// Observer model: callbacks read the store at the pipeline's flush
    /// cadence and emit one data point per device that has a value.
    pub fn observer(meter: &Meter, store: Arc<ObservedValueStore>) -> Self {
        let mut instruments = Vec::with_capacity(GpuMetric::ALL.len());
        for metric in GpuMetric::ALL {
            let cells = Arc::clone(&store);
            let gauge = meter
                .i64_observable_gauge(metric.name())
                .with_unit(metric.unit())
                .with_description(metric.description())
                .with_callback(move |observer: &dyn AsyncInstrument<i64>| {
                    for device in cells.device_ids() {
                        if let Some(value) = cells.get(device, metric) {
                            observer.observe(value, &[KeyValue::new("device", device.clone())]);
                        }
                    }
                })
                .build();
            instruments.push(gauge);
        }

        MetricSink::Observer(ObserverSink {
            store,
            _instruments: instruments,
        })
    }

    /// Direct-record model: plain gauges, recorded at scrape time
    pub fn direct(meter: &Meter) -> Self {
        let gauges = GpuMetric::ALL
            .iter()
            .map(|metric| {
                let gauge = meter
                    .i64_gauge(metric.name())
                    .with_unit(metric.unit())
                    .with_description(metric.description())
                    .build();
                (*metric, gauge)
            })
            .collect();

        MetricSink::Direct(DirectRecordSink { gauges })
    }

    /// Route one sampled value, tagged with its device id.
    ///
    /// Values arrive in the unit of the underlying metric and leave
    /// unchanged.
    pub fn record(&self, device: &str, metric: GpuMetric, value: i64) {
        match self {
            MetricSink::Observer(sink) => sink.store.set(device, metric, value),
            MetricSink::Direct(sink) => {
                if let Some(gauge) = sink.gauges.get(&metric) {
                    gauge.record(value, &[KeyValue::new("device", device.to_string())]);
                }
            }
        }
    }

    /// The model this sink was constructed with
    pub fn model(&self) -> EmissionModel {
        match self {
            MetricSink::Observer(_) => EmissionModel::Observer,
            MetricSink::Direct(_) => EmissionModel::Direct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::metrics::MeterProvider;
    use opentelemetry_sdk::metrics::data;
    use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
    use opentelemetry_sdk::runtime;
    use opentelemetry_sdk::testing::metrics::InMemoryMetricExporter;
    use std::time::Duration;

    fn test_provider() -> (SdkMeterProvider, InMemoryMetricExporter) {
        let exporter = InMemoryMetricExporter::default();
        // Interval far beyond test runtime; flushes are explicit
        let reader = PeriodicReader::builder(exporter.clone(), runtime::Tokio)
            .with_interval(Duration::from_secs(3600))
            .build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        (provider, exporter)
    }

    fn gauge_points(exporter: &InMemoryMetricExporter, name: &str) -> Vec<(String, i64)> {
        let mut points = Vec::new();
        for resource_metrics in exporter.get_finished_metrics().unwrap() {
            for scope in &resource_metrics.scope_metrics {
                for metric in &scope.metrics {
                    if metric.name != name {
                        continue;
                    }
                    let gauge = metric
                        .data
                        .as_any()
                        .downcast_ref::<data::Gauge<i64>>()
                        .expect("i64 gauge");
                    for point in &gauge.data_points {
                        let device = point
                            .attributes
                            .iter()
                            .find(|kv| kv.key.as_str() == "device")
                            .map(|kv| kv.value.to_string())
                            .unwrap_or_default();
                        points.push((device, point.value));
                    }
                }
            }
        }
        points
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_direct_sink_emits_tagged_point() {
        let (provider, exporter) = test_provider();
        let meter = provider.meter("test");

        let sink = MetricSink::direct(&meter);
        assert_eq!(sink.model(), EmissionModel::Direct);

        sink.record("GPU-a", GpuMetric::Temperature, 65);
        provider.force_flush().unwrap();

        let points = gauge_points(&exporter, "gpu/temperature");
        assert_eq!(points, vec![("GPU-a".to_string(), 65)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_observer_sink_reports_latest_value_not_average() {
        let (provider, exporter) = test_provider();
        let meter = provider.meter("test");

        let store = Arc::new(ObservedValueStore::new(["GPU-a"]));
        let sink = MetricSink::observer(&meter, Arc::clone(&store));
        assert_eq!(sink.model(), EmissionModel::Observer);

        // Twelve scrape ticks between flushes; the flush sees the 12th
        for tick in 1..=12 {
            sink.record("GPU-a", GpuMetric::Temperature, tick);
        }
        provider.force_flush().unwrap();

        let points = gauge_points(&exporter, "gpu/temperature");
        assert_eq!(points, vec![("GPU-a".to_string(), 12)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_observer_sink_skips_unwritten_cells() {
        let (provider, exporter) = test_provider();
        let meter = provider.meter("test");

        let store = Arc::new(ObservedValueStore::new(["GPU-a", "GPU-b"]));
        let _sink = MetricSink::observer(&meter, Arc::clone(&store));

        store.set("GPU-a", GpuMetric::Temperature, 65);
        provider.force_flush().unwrap();

        // GPU-b never reported; it must not appear as zero
        let points = gauge_points(&exporter, "gpu/temperature");
        assert_eq!(points, vec![("GPU-a".to_string(), 65)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_flush_before_first_tick_emits_nothing() {
        let (provider, exporter) = test_provider();
        let meter = provider.meter("test");

        let store = Arc::new(ObservedValueStore::new(["GPU-a"]));
        let _sink = MetricSink::observer(&meter, store);

        provider.force_flush().unwrap();

        for metric in GpuMetric::ALL {
            assert!(gauge_points(&exporter, metric.name()).is_empty());
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_direct_sink_emits_per_device() {
        let (provider, exporter) = test_provider();
        let meter = provider.meter("test");

        let sink = MetricSink::direct(&meter);
        sink.record("GPU-a", GpuMetric::PowerUsage, 150_000);
        sink.record("GPU-b", GpuMetric::PowerUsage, 175_000);
        provider.force_flush().unwrap();

        let mut points = gauge_points(&exporter, "gpu/powerusage");
        points.sort();
        assert_eq!(
            points,
            vec![
                ("GPU-a".to_string(), 150_000),
                ("GPU-b".to_string(), 175_000)
            ]
        );
    }

    #[test]
    fn test_emission_model_parsing() {
        assert_eq!("observer".parse::<EmissionModel>().unwrap(), EmissionModel::Observer);
        assert_eq!("direct".parse::<EmissionModel>().unwrap(), EmissionModel::Direct);
        assert_eq!("DIRECT".parse::<EmissionModel>().unwrap(), EmissionModel::Direct);
        assert!("pull".parse::<EmissionModel>().is_err());
    }

    #[test]
    fn test_emission_model_display() {
        assert_eq!(EmissionModel::Observer.to_string(), "observer");
        assert_eq!(EmissionModel::Direct.to_string(), "direct");
    }
}
