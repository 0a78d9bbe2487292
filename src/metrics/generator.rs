//! Generator Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the dirty-data generator
pub struct GeneratorMetrics;

impl GeneratorMetrics {
    /// Record one processed source row and what happened to it
    pub fn record_row(value_changed: bool, duplicated: bool, samples_joined: usize) {
        ::metrics::counter!(phase_metric!(counter, "generator", "rows_processed")).increment(1);
        if value_changed {
            ::metrics::counter!(phase_metric!(counter, "generator", "rows_corrupted")).increment(1);
        }
        if duplicated {
            ::metrics::counter!(phase_metric!(counter, "generator", "rows_duplicated"))
                .increment(1);
        }
        ::metrics::counter!(phase_metric!(counter, "generator", "sample_rows_written"))
            .increment(samples_joined as u64);
    }

    /// Record a malformed source row
    pub fn record_row_skipped() {
        ::metrics::counter!(phase_metric!(counter, "generator", "rows_skipped")).increment(1);
    }

    /// Record the end of a run
    pub fn record_run(dirty_population: u64, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "generator", "runs")).increment(1);
        ::metrics::gauge!(phase_metric!(gauge, "generator", "dirty_population"))
            .set(dirty_population as f64);
        ::metrics::histogram!(phase_metric!(histogram, "generator", "duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for GeneratorMetrics {
    fn register_metrics() {
        use metrics::{counter, gauge, histogram};

        let _ = counter!(phase_metric!(counter, "generator", "rows_processed"));
        let _ = counter!(phase_metric!(counter, "generator", "rows_corrupted"));
        let _ = counter!(phase_metric!(counter, "generator", "rows_duplicated"));
        let _ = counter!(phase_metric!(counter, "generator", "rows_skipped"));
        let _ = counter!(phase_metric!(counter, "generator", "sample_rows_written"));
        let _ = counter!(phase_metric!(counter, "generator", "runs"));
        let _ = gauge!(phase_metric!(gauge, "generator", "dirty_population"));
        let _ = histogram!(phase_metric!(histogram, "generator", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "generator"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "generator", "rows_processed"),
                metric_type: MetricType::Counter,
                help: "Clean source rows turned into augmented records",
            },
            MetricDoc {
                name: phase_metric!(counter, "generator", "rows_corrupted"),
                metric_type: MetricType::Counter,
                help: "Rows whose value or predicate fields were changed",
            },
            MetricDoc {
                name: phase_metric!(counter, "generator", "rows_duplicated"),
                metric_type: MetricType::Counter,
                help: "Rows given more than one physical copy",
            },
            MetricDoc {
                name: phase_metric!(counter, "generator", "rows_skipped"),
                metric_type: MetricType::Counter,
                help: "Malformed source rows skipped",
            },
            MetricDoc {
                name: phase_metric!(counter, "generator", "sample_rows_written"),
                metric_type: MetricType::Counter,
                help: "Rows written across all sample streams",
            },
            MetricDoc {
                name: phase_metric!(counter, "generator", "runs"),
                metric_type: MetricType::Counter,
                help: "Completed generation runs",
            },
            MetricDoc {
                name: phase_metric!(gauge, "generator", "dirty_population"),
                metric_type: MetricType::Gauge,
                help: "Sum of duplication counts in the last generated population",
            },
            MetricDoc {
                name: phase_metric!(histogram, "generator", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall-clock duration of a generation run",
            },
        ]
    }
}
