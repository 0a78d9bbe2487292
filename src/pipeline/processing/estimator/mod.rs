//! Sample-based correction estimators.
//!
//! Both variants share the per-row contribution ("phi") formulas. RawSC
//! extrapolates the clean side of the sample directly; NormalizedSC
//! estimates the dirty-minus-clean bias and subtracts it from the exact
//! full-population dirty aggregate.

pub mod averaged;
pub mod stats;

use serde::Serialize;

use crate::domain::{
    Aggregate, AggregateSet, AugmentedRecord, Method, PointEstimate, PopulationParameters,
    Predicate,
};
use crate::error::{EstimateError, Result, SampleCleanError};

pub use averaged::AveragedEstimator;
pub use stats::ConfidenceInterval;

/// Estimates for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    /// Records in the sample (K)
    pub sample_rows: usize,
    pub aggregates: AggregateSet<PointEstimate>,
}

/// Anything that turns a sample into per-aggregate estimates.
pub trait SampleEstimator {
    fn method(&self) -> Method;

    fn estimate(&self, sample: &[AugmentedRecord]) -> std::result::Result<Estimate, EstimateError>;
}

/// Which side is extrapolated and what baseline it is corrected against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorrectionStrategy {
    /// Zero baseline, clean side only
    Raw,
    /// Known dirty aggregates minus the sample-mean bias
    Normalized { all_dirty: AggregateSet<f64> },
}

/// Per-row contributions for the three aggregates.
#[derive(Debug, Clone, PartialEq)]
struct PhiColumns {
    count: Vec<f64>,
    sum: Vec<f64>,
    avg: Vec<f64>,
}

impl PhiColumns {
    fn with_capacity(n: usize) -> Self {
        Self {
            count: Vec::with_capacity(n),
            sum: Vec::with_capacity(n),
            avg: Vec::with_capacity(n),
        }
    }

    fn get(&self, aggregate: Aggregate) -> &[f64] {
        match aggregate {
            Aggregate::Count => &self.count,
            Aggregate::Sum => &self.sum,
            Aggregate::Avg => &self.avg,
        }
    }

    /// Element-wise `self - other`
    fn minus(&self, other: &PhiColumns) -> PhiColumns {
        let diff =
            |a: &[f64], b: &[f64]| -> Vec<f64> { a.iter().zip(b).map(|(x, y)| x - y).collect() };
        PhiColumns {
            count: diff(&self.count, &other.count),
            sum: diff(&self.sum, &other.sum),
            avg: diff(&self.avg, &other.avg),
        }
    }
}

/// Harmonic duplication rate `d = K / sum(1 / duplication_count)`
pub fn duplication_factor(sample: &[AugmentedRecord]) -> f64 {
    let inverse_sum: f64 = sample
        .iter()
        .map(|r| 1.0 / f64::from(r.duplication_count.max(1)))
        .sum();
    if inverse_sum == 0.0 {
        return 1.0;
    }
    sample.len() as f64 / inverse_sum
}

/// Scale applied to AVG contributions; zero when nothing matched since every
/// contribution is zero in that case.
fn avg_scale(numerator: f64, matches: usize) -> f64 {
    if matches == 0 {
        0.0
    } else {
        numerator / matches as f64
    }
}

/// Clean-side contributions, de-duplicated before extrapolating by N
fn clean_phi(sample: &[AugmentedRecord], preds: &[bool], n: f64, d: f64) -> PhiColumns {
    let k = sample.len() as f64;
    let k_pred = preds.iter().filter(|p| **p).count();
    let scale = avg_scale(d * k, k_pred);

    let mut phi = PhiColumns::with_capacity(sample.len());
    for (record, &pred) in sample.iter().zip(preds) {
        let dup = f64::from(record.duplication_count.max(1));
        if pred {
            phi.count.push(n / dup);
            phi.sum.push(n * record.clean_value / dup);
            phi.avg.push(scale * (record.clean_value / dup));
        } else {
            phi.count.push(0.0);
            phi.sum.push(0.0);
            phi.avg.push(0.0);
        }
    }
    phi
}

/// Dirty-side contributions; dirty rows already carry their duplicates
fn dirty_phi(sample: &[AugmentedRecord], preds: &[bool], n: f64) -> PhiColumns {
    let k = sample.len() as f64;
    let k_pred = preds.iter().filter(|p| **p).count();
    let scale = avg_scale(k, k_pred);

    let mut phi = PhiColumns::with_capacity(sample.len());
    for (record, &pred) in sample.iter().zip(preds) {
        if pred {
            phi.count.push(n);
            phi.sum.push(n * record.dirty_value);
            phi.avg.push(scale * record.dirty_value);
        } else {
            phi.count.push(0.0);
            phi.sum.push(0.0);
            phi.avg.push(0.0);
        }
    }
    phi
}

/// RawSC or NormalizedSC over one population.
#[derive(Debug, Clone)]
pub struct CorrectionEstimator {
    population_size: u64,
    predicate: Predicate,
    strategy: CorrectionStrategy,
}

impl CorrectionEstimator {
    pub fn new(population_size: u64, predicate: Predicate, strategy: CorrectionStrategy) -> Self {
        Self {
            population_size,
            predicate,
            strategy,
        }
    }

    pub fn raw(params: &PopulationParameters) -> Self {
        Self::new(params.population_size, params.predicate.clone(), CorrectionStrategy::Raw)
    }

    /// Requires the full-population dirty aggregates
    pub fn normalized(params: &PopulationParameters) -> Result<Self> {
        let all_dirty = params
            .all_dirty
            .ok_or_else(|| SampleCleanError::MissingField("all_dirty aggregates".to_string()))?;
        Ok(Self::new(
            params.population_size,
            params.predicate.clone(),
            CorrectionStrategy::Normalized { all_dirty },
        ))
    }

    pub fn strategy(&self) -> &CorrectionStrategy {
        &self.strategy
    }

    pub fn population_size(&self) -> u64 {
        self.population_size
    }
}

impl SampleEstimator for CorrectionEstimator {
    fn method(&self) -> Method {
        match self.strategy {
            CorrectionStrategy::Raw => Method::RawSc,
            CorrectionStrategy::Normalized { .. } => Method::NormalizedSc,
        }
    }

    fn estimate(&self, sample: &[AugmentedRecord]) -> std::result::Result<Estimate, EstimateError> {
        if sample.is_empty() {
            return Err(EstimateError::EmptySample);
        }
        let n = self.population_size as f64;
        let d = duplication_factor(sample);
        let clean_preds: Vec<bool> =
            sample.iter().map(|r| self.predicate.matches_clean(r)).collect();
        let clean_matches = clean_preds.iter().any(|p| *p);

        let aggregates = match self.strategy {
            CorrectionStrategy::Raw => {
                if !clean_matches {
                    return Err(EstimateError::NoPredicateMatches);
                }
                let phi = clean_phi(sample, &clean_preds, n, d);
                AggregateSet::from_fn(|agg| stats::point_estimate(phi.get(agg)))
            }
            CorrectionStrategy::Normalized { all_dirty } => {
                let dirty_preds: Vec<bool> =
                    sample.iter().map(|r| self.predicate.matches_dirty(r)).collect();
                if !clean_matches && !dirty_preds.iter().any(|p| *p) {
                    return Err(EstimateError::NoPredicateMatches);
                }
                let clean = clean_phi(sample, &clean_preds, n, d);
                let q = dirty_phi(sample, &dirty_preds, n).minus(&clean);
                AggregateSet::from_fn(|agg| {
                    let bias = stats::point_estimate(q.get(agg));
                    PointEstimate {
                        mean: all_dirty.get(agg) - bias.mean,
                        variance: bias.variance,
                    }
                })
            }
        };

        Ok(Estimate {
            sample_rows: sample.len(),
            aggregates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Condition;

    fn predicate() -> Predicate {
        Predicate::new(vec![Condition { field: 0, equals: "T".to_string() }])
    }

    fn row(value: f64, pred: bool, dup: u32) -> AugmentedRecord {
        let fields = vec![if pred { "T" } else { "F" }.to_string()];
        AugmentedRecord {
            duplication_count: dup,
            ..AugmentedRecord::uncorrupted(value, fields)
        }
    }

    fn params(n: u64, all_dirty: Option<AggregateSet<f64>>) -> PopulationParameters {
        PopulationParameters {
            population_size: n,
            predicate: predicate(),
            all_dirty,
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_rawsc_four_row_example() {
        let sample = vec![
            row(10.0, true, 1),
            row(10.0, true, 1),
            row(10.0, false, 1),
            row(10.0, false, 1),
        ];
        let est = CorrectionEstimator::raw(&params(4, None)).estimate(&sample).unwrap();

        assert_eq!(est.sample_rows, 4);
        assert_eq!(est.aggregates.count.mean, 2.0);
        assert_close(est.aggregates.count.variance, 16.0 / 3.0);
        assert_close(est.aggregates.sum.mean, 20.0);
        assert_close(est.aggregates.avg.mean, 10.0);
    }

    #[test]
    fn test_rawsc_full_sample_recovers_clean_aggregates() {
        let values = [3.0, 8.0, 5.0, 12.0, 7.0, 1.0];
        let preds = [true, false, true, true, false, true];
        let sample: Vec<_> = values.iter().zip(preds).map(|(&v, p)| row(v, p, 1)).collect();
        let est = CorrectionEstimator::raw(&params(sample.len() as u64, None))
            .estimate(&sample)
            .unwrap();

        let clean_sum: f64 = values.iter().zip(preds).filter(|(_, p)| *p).map(|(v, _)| v).sum();
        assert_close(est.aggregates.count.mean, 4.0);
        assert_close(est.aggregates.sum.mean, clean_sum);
        assert_close(est.aggregates.avg.mean, clean_sum / 4.0);
    }

    #[test]
    fn test_rawsc_deduplicates_contributions() {
        // Two physical copies of the same logical row count once
        let sample = vec![row(6.0, true, 2), row(6.0, true, 2), row(4.0, true, 1)];
        let est = CorrectionEstimator::raw(&params(3, None)).estimate(&sample).unwrap();
        // phi_count = [1.5, 1.5, 3] -> mean 2
        assert_close(est.aggregates.count.mean, 2.0);
        // d = 3 / (0.5 + 0.5 + 1) = 1.5; avg phi = 1.5 * 3 / 3 * [3, 3, 4]
        assert_close(duplication_factor(&sample), 1.5);
        assert_close(est.aggregates.avg.mean, 1.5 * 10.0 / 3.0);
    }

    #[test]
    fn test_rawsc_undefined_cases() {
        let estimator = CorrectionEstimator::raw(&params(10, None));
        assert_eq!(estimator.estimate(&[]), Err(EstimateError::EmptySample));
        assert_eq!(
            estimator.estimate(&[row(1.0, false, 1), row(2.0, false, 2)]),
            Err(EstimateError::NoPredicateMatches)
        );
    }

    #[test]
    fn test_single_row_variance_is_zero() {
        let est = CorrectionEstimator::raw(&params(10, None))
            .estimate(&[row(5.0, true, 1)])
            .unwrap();
        for agg in Aggregate::ALL {
            assert_eq!(est.aggregates.get(agg).variance, 0.0);
        }
    }

    #[test]
    fn test_normalized_requires_dirty_aggregates() {
        assert!(matches!(
            CorrectionEstimator::normalized(&params(10, None)),
            Err(SampleCleanError::MissingField(_))
        ));
    }

    #[test]
    fn test_normalized_without_corruption_returns_dirty_aggregates() {
        let all_dirty = AggregateSet { count: 1234.0, sum: 98765.5, avg: 80.03 };
        let sample = vec![
            row(10.0, true, 1),
            row(3.5, false, 1),
            row(7.25, true, 1),
            row(1.0, true, 1),
        ];
        let estimator = CorrectionEstimator::normalized(&params(5000, Some(all_dirty))).unwrap();
        assert_eq!(estimator.method(), Method::NormalizedSc);

        let est = estimator.estimate(&sample).unwrap();
        for agg in Aggregate::ALL {
            assert_eq!(est.aggregates.get(agg).mean, all_dirty.get(agg));
            assert_eq!(est.aggregates.get(agg).variance, 0.0);
        }
    }

    #[test]
    fn test_normalized_corrects_value_corruption() {
        // One row misread 10 -> 70 on the dirty side
        let mut corrupted = row(10.0, true, 1);
        corrupted.dirty_value = 70.0;
        let sample = vec![corrupted, row(10.0, true, 1)];
        let all_dirty = AggregateSet { count: 2.0, sum: 80.0, avg: 40.0 };
        let est = CorrectionEstimator::normalized(&params(2, Some(all_dirty)))
            .unwrap()
            .estimate(&sample)
            .unwrap();

        // q_sum = [2*70 - 2*10, 0] -> mean 60
        assert_close(est.aggregates.sum.mean, 20.0);
        assert_close(est.aggregates.count.mean, 2.0);
        // q_avg = [70 - 10, 0] -> mean 30
        assert_close(est.aggregates.avg.mean, 10.0);
        assert_close(est.aggregates.sum.variance, 7200.0);
    }

    #[test]
    fn test_normalized_handles_one_sided_matches() {
        // Clean side never matches but the dirty side does
        let mut flipped = row(4.0, false, 1);
        flipped.dirty_predicate_fields = vec!["T".to_string()];
        let sample = vec![flipped, row(2.0, false, 1)];
        let all_dirty = AggregateSet { count: 10.0, sum: 40.0, avg: 4.0 };
        let est = CorrectionEstimator::normalized(&params(10, Some(all_dirty)))
            .unwrap()
            .estimate(&sample)
            .unwrap();

        // q_count = [10, 0] -> mean 5
        assert_close(est.aggregates.count.mean, 5.0);
        assert!(est.aggregates.avg.mean.is_finite());

        let neither = vec![row(1.0, false, 1)];
        let estimator = CorrectionEstimator::normalized(&params(10, Some(all_dirty))).unwrap();
        assert_eq!(estimator.estimate(&neither), Err(EstimateError::NoPredicateMatches));
    }
}
