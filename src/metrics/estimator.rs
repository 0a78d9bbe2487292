//! Estimator Phase Metrics

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

/// Metrics collection for the correction estimators and their driver
pub struct EstimatorMetrics;

impl EstimatorMetrics {
    /// Record a sample that produced an estimate
    pub fn record_estimate(sample_rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "estimator", "samples_estimated")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "estimator", "sample_rows"))
            .record(sample_rows as f64);
    }

    /// Record a sample that produced no result
    pub fn record_skipped() {
        ::metrics::counter!(phase_metric!(counter, "estimator", "samples_skipped")).increment(1);
    }

    /// Record malformed lines dropped while reading a sample
    pub fn record_malformed_lines(count: usize) {
        if count > 0 {
            ::metrics::counter!(phase_metric!(counter, "estimator", "malformed_lines"))
                .increment(count as u64);
        }
    }

    /// Record a finished driver run
    pub fn record_run(duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "estimator", "runs")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "estimator", "duration_seconds"))
            .record(duration_secs);
    }
}

impl PhaseMetrics for EstimatorMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "estimator", "samples_estimated"));
        let _ = counter!(phase_metric!(counter, "estimator", "samples_skipped"));
        let _ = counter!(phase_metric!(counter, "estimator", "malformed_lines"));
        let _ = counter!(phase_metric!(counter, "estimator", "runs"));
        let _ = histogram!(phase_metric!(histogram, "estimator", "sample_rows"));
        let _ = histogram!(phase_metric!(histogram, "estimator", "duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "estimator"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "estimator", "samples_estimated"),
                metric_type: MetricType::Counter,
                help: "Samples that produced an estimate",
            },
            MetricDoc {
                name: phase_metric!(counter, "estimator", "samples_skipped"),
                metric_type: MetricType::Counter,
                help: "Samples skipped as empty or without predicate matches",
            },
            MetricDoc {
                name: phase_metric!(counter, "estimator", "malformed_lines"),
                metric_type: MetricType::Counter,
                help: "Malformed sample lines ignored by the parser",
            },
            MetricDoc {
                name: phase_metric!(counter, "estimator", "runs"),
                metric_type: MetricType::Counter,
                help: "Completed estimation runs",
            },
            MetricDoc {
                name: phase_metric!(histogram, "estimator", "sample_rows"),
                metric_type: MetricType::Histogram,
                help: "Rows per estimated sample",
            },
            MetricDoc {
                name: phase_metric!(histogram, "estimator", "duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall-clock duration of an estimation run",
            },
        ]
    }
}
