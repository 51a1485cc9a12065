//! Prometheus metrics for Virtual Concat.
//!
//! All metrics follow the naming convention: `vc_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: create outcomes, probe passes, teardowns
//! - **Gauge**: active instances, component handles held
//! - **Histogram**: create duration

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    /// Instances currently active
    pub static ref INSTANCES_ACTIVE: Gauge = Gauge::new(
        "vc_instances_active",
        "Number of composite instances currently active"
    ).expect("metric creation failed");

    /// Create outcomes by kind
    pub static ref CREATE_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("vc_create_outcomes_total", "Create attempts by outcome"),
        &["outcome"]  // outcome: active/deferred/config/aggregation/registration/resource
    ).expect("metric creation failed");

    /// Component handles held across all instances
    pub static ref COMPONENT_HANDLES_HELD: Gauge = Gauge::new(
        "vc_component_handles_held",
        "Component handles currently held by active instances"
    ).expect("metric creation failed");

    /// Probe passes run
    pub static ref PROBE_PASSES: Counter = Counter::new(
        "vc_probe_passes_total",
        "Total probe passes over the pending queue"
    ).expect("metric creation failed");

    /// Instances torn down
    pub static ref TEARDOWNS: Counter = Counter::new(
        "vc_teardowns_total",
        "Total composite instances torn down"
    ).expect("metric creation failed");

    /// Create duration histogram
    pub static ref CREATE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "vc_create_duration_seconds",
            "Time spent in one create attempt"
        ).buckets(exponential_buckets(0.00001, 2.0, 16).expect("valid buckets"))
    ).expect("metric creation failed");
}

/// Handle on the registered metric set
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once; already registered collectors are skipped.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Instances
        Box::new(INSTANCES_ACTIVE.clone()),
        Box::new(CREATE_OUTCOMES.clone()),
        Box::new(CREATE_DURATION.clone()),
        Box::new(TEARDOWNS.clone()),
        // Resources
        Box::new(COMPONENT_HANDLES_HELD.clone()),
        // Driver
        Box::new(PROBE_PASSES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
