use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, instrument, warn};

use crate::app::ports::{ResultOutputPort, SampleSourcePort};
use crate::domain::{Aggregate, Method, SampleResult};
use crate::metrics::EstimatorMetrics;
use crate::pipeline::processing::estimator::SampleEstimator;

/// A sample size that produced no result, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedSample {
    pub sample_size: u32,
    pub reason: String,
}

/// Outcome of one driver run over every available sample size.
#[derive(Debug, Clone, Serialize)]
pub struct EstimationReport {
    pub method: Method,
    pub results: BTreeMap<Aggregate, Vec<SampleResult>>,
    pub skipped: Vec<SkippedSample>,
    pub malformed_lines: usize,
}

impl EstimationReport {
    pub fn results_for(&self, aggregate: Aggregate) -> &[SampleResult] {
        self.results.get(&aggregate).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Runs one estimator over every sample size and writes one result table
/// per aggregate.
pub struct EstimationUseCase {
    estimator: Box<dyn SampleEstimator>,
    source: Box<dyn SampleSourcePort>,
    output: Box<dyn ResultOutputPort>,
}

impl EstimationUseCase {
    pub fn new(
        estimator: Box<dyn SampleEstimator>,
        source: Box<dyn SampleSourcePort>,
        output: Box<dyn ResultOutputPort>,
    ) -> Self {
        Self {
            estimator,
            source,
            output,
        }
    }

    #[instrument(skip(self), fields(method = %self.estimator.method()))]
    pub fn run(&self) -> Result<EstimationReport> {
        let started = Instant::now();
        let method = self.estimator.method();

        let mut sizes = self.source.sample_sizes().context("Failed to list samples")?;
        sizes.sort_unstable();
        sizes.dedup();
        if sizes.is_empty() {
            warn!("No samples found");
        }

        let mut report = EstimationReport {
            method,
            results: Aggregate::ALL.iter().map(|a| (*a, Vec::new())).collect(),
            skipped: Vec::new(),
            malformed_lines: 0,
        };

        for size in sizes {
            let sample = match self.source.load_sample(size) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!("Skipping sample {}: failed to load: {:#}", size, e);
                    EstimatorMetrics::record_skipped();
                    report.skipped.push(SkippedSample {
                        sample_size: size,
                        reason: format!("failed to load: {:#}", e),
                    });
                    continue;
                }
            };
            report.malformed_lines += sample.malformed_lines;
            EstimatorMetrics::record_malformed_lines(sample.malformed_lines);

            match self.estimator.estimate(&sample.records) {
                Ok(estimate) => {
                    for aggregate in Aggregate::ALL {
                        let point = estimate.aggregates.get(aggregate);
                        report.results.entry(aggregate).or_default().push(SampleResult {
                            sample_size: size,
                            mean: point.mean,
                            variance: point.variance,
                        });
                    }
                    EstimatorMetrics::record_estimate(estimate.sample_rows);
                    info!("Processed sample {} ({} rows)", size, estimate.sample_rows);
                }
                Err(e) => {
                    warn!("Skipping sample {}: {}", size, e);
                    EstimatorMetrics::record_skipped();
                    report.skipped.push(SkippedSample {
                        sample_size: size,
                        reason: e.to_string(),
                    });
                }
            }
        }

        for (aggregate, results) in &report.results {
            self.output
                .write_results(method, *aggregate, results)
                .with_context(|| format!("Failed to write {} {} results", method, aggregate))?;
        }

        EstimatorMetrics::record_run(started.elapsed().as_secs_f64());
        info!(
            "✅ {} finished: {} samples estimated, {} skipped",
            method.label(),
            report.results_for(Aggregate::Count).len(),
            report.skipped.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ResultInputPort;
    use crate::domain::{AugmentedRecord, Condition, PopulationParameters, Predicate};
    use crate::infra::in_memory::{InMemoryResultStore, InMemorySampleSource};
    use crate::pipeline::processing::estimator::{AveragedEstimator, CorrectionEstimator};
    use crate::pipeline::processing::parser::ParsedSample;

    fn params() -> PopulationParameters {
        PopulationParameters {
            population_size: 4,
            predicate: Predicate::new(vec![Condition { field: 0, equals: "T".to_string() }]),
            all_dirty: None,
        }
    }

    fn row(pred: bool) -> AugmentedRecord {
        AugmentedRecord::uncorrupted(10.0, vec![if pred { "T" } else { "F" }.to_string()])
    }

    fn source() -> InMemorySampleSource {
        let mut source = InMemorySampleSource::new();
        source.insert(4, vec![row(true), row(true), row(false), row(false)]);
        source.insert(2, vec![row(false), row(false)]);
        source.insert(1, Vec::new());
        source
    }

    #[test]
    fn test_driver_collects_sorted_results_and_skips_undefined_samples() {
        let store = InMemoryResultStore::new();
        let use_case = EstimationUseCase::new(
            Box::new(CorrectionEstimator::raw(&params())),
            Box::new(source()),
            Box::new(store.clone()),
        );

        let report = use_case.run().unwrap();
        assert_eq!(report.method, Method::RawSc);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].sample_size, 1);

        let count = report.results_for(Aggregate::Count);
        assert_eq!(count.len(), 1);
        assert_eq!(count[0].sample_size, 4);
        assert_eq!(count[0].mean, 2.0);
        assert!((count[0].variance - 16.0 / 3.0).abs() < 1e-12);

        // every aggregate table is written, even when short
        for aggregate in Aggregate::ALL {
            let stored = store.read_results(Method::RawSc, aggregate).unwrap().unwrap();
            assert_eq!(stored.len(), 1);
        }
    }

    #[test]
    fn test_driver_uses_estimator_method_for_tables() {
        let store = InMemoryResultStore::new();
        let use_case = EstimationUseCase::new(
            Box::new(AveragedEstimator::new(&params(), 2)),
            Box::new(source()),
            Box::new(store.clone()),
        );
        let report = use_case.run().unwrap();
        assert_eq!(report.method, Method::RawScAveraged);
        assert!(store.read_results(Method::RawScAveraged, Aggregate::Avg).unwrap().is_some());
        assert!(store.read_results(Method::RawSc, Aggregate::Avg).unwrap().is_none());
    }

    /// Lists two samples but fails to read the larger one
    struct PartlyUnreadableSource;

    impl SampleSourcePort for PartlyUnreadableSource {
        fn sample_sizes(&self) -> Result<Vec<u32>> {
            Ok(vec![1000, 500])
        }

        fn load_sample(&self, sample_size: u32) -> Result<ParsedSample> {
            if sample_size == 1000 {
                anyhow::bail!("stream did not contain valid UTF-8");
            }
            Ok(ParsedSample {
                records: vec![row(true), row(false)],
                malformed_lines: 0,
            })
        }
    }

    #[test]
    fn test_unreadable_sample_is_skipped_and_tables_still_written() {
        let store = InMemoryResultStore::new();
        let use_case = EstimationUseCase::new(
            Box::new(CorrectionEstimator::raw(&params())),
            Box::new(PartlyUnreadableSource),
            Box::new(store.clone()),
        );

        let report = use_case.run().unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].sample_size, 1000);
        assert!(report.skipped[0].reason.contains("valid UTF-8"));

        let count = store.read_results(Method::RawSc, Aggregate::Count).unwrap().unwrap();
        assert_eq!(count.len(), 1);
        assert_eq!(count[0].sample_size, 500);
        assert_eq!(count[0].mean, 2.0);
    }
}
