//! Phase-organized metrics for the generator and the estimators
//!
//! Each phase defines its own metrics in a dedicated submodule. Batch runs
//! have nothing to scrape, so the recorder renders a Prometheus text
//! snapshot in-process that the CLI can write to a file.

pub mod estimator;
pub mod generator;
pub mod registry;

pub use estimator::EstimatorMetrics;
pub use generator::GeneratorMetrics;

use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the in-process Prometheus recorder and register all phase metrics.
///
/// Idempotent. Without this call the metric macros are no-ops.
pub fn init_metrics() {
    INIT.call_once(|| {
        let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
        match builder.install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("METRICS: recorder handle already set");
                }
                registry::register_all_metrics();
                info!("Prometheus recorder installed");
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Render the current snapshot in Prometheus text format
pub fn render() -> Option<String> {
    HANDLE.get().map(|h| h.render())
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Build a metric name following `sc_{phase}_{metric_name}[_total]`
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("sc_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("sc_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("sc_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_naming_convention() {
        assert_eq!(
            phase_metric!(counter, "generator", "rows_processed"),
            "sc_generator_rows_processed_total"
        );
        assert_eq!(
            phase_metric!(histogram, "estimator", "sample_rows"),
            "sc_estimator_sample_rows"
        );
        assert_eq!(
            phase_metric!(gauge, "generator", "dirty_population"),
            "sc_generator_dirty_population"
        );
    }
}
