//! Registers the metrics of every phase and detects naming conflicts early.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::generator::GeneratorMetrics>(&mut all_metrics);
    register_phase_metrics::<super::estimator::EstimatorMetrics>(&mut all_metrics);

    info!("Registered {} total metrics across all phases", all_metrics.len());
    for doc in all_metrics.values() {
        debug!(
            "  - {} ({:?}) [{}]: {}",
            doc.name,
            doc.metric_type,
            extract_phase_from_metric_name(doc.name),
            doc.help
        );
    }
}

/// Register metrics for a specific phase and detect conflicts
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<String, MetricDoc>) {
    T::register_metrics();
    let phase_docs = T::metrics_documentation();
    let phase_name = T::phase_name();

    debug!("Registering {} metrics for phase '{}'", phase_docs.len(), phase_name);

    for doc in phase_docs {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' is defined twice (current phase '{}')",
                doc.name, phase_name
            );
        } else {
            all_metrics.insert(doc.name.to_string(), doc);
        }
    }
}

/// Extract phase name from metric name (e.g., "sc_generator_runs_total" -> "generator")
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("sc_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{EstimatorMetrics, GeneratorMetrics};
    use std::collections::HashSet;

    #[test]
    fn test_extract_phase_from_metric_name() {
        assert_eq!(extract_phase_from_metric_name("sc_generator_runs_total"), "generator");
        assert_eq!(extract_phase_from_metric_name("sc_estimator_sample_rows"), "estimator");
        assert_eq!(extract_phase_from_metric_name("invalid_metric_name"), "unknown");
    }

    #[test]
    fn test_phase_metric_names_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for doc in GeneratorMetrics::metrics_documentation()
            .into_iter()
            .chain(EstimatorMetrics::metrics_documentation())
        {
            assert!(seen.insert(doc.name), "duplicate metric {}", doc.name);
            let phase = extract_phase_from_metric_name(doc.name);
            assert!(phase == "generator" || phase == "estimator");
        }
    }
}
