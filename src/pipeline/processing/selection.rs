//! Picks, per sample size, the estimator with the narrowest confidence interval.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::{Method, PointEstimate, SampleResult};
use crate::pipeline::processing::estimator::ConfidenceInterval;

/// The estimator chosen for one sample size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BestChoice {
    pub sample_size: u32,
    pub method: Method,
    pub mean: f64,
    pub variance: f64,
    pub ci: ConfidenceInterval,
    /// CI width as a percentage of the clean aggregate, when known
    pub ci_width_pct: Option<f64>,
}

/// Result tables of competing estimators for one aggregate.
pub struct Candidates<'a> {
    tables: Vec<(Method, &'a [SampleResult])>,
}

impl<'a> Candidates<'a> {
    pub fn new() -> Self {
        Self { tables: Vec::new() }
    }

    pub fn add(mut self, method: Method, results: &'a [SampleResult]) -> Self {
        self.tables.push((method, results));
        self
    }

    /// Narrowest interval wins; on a tie the earlier table is kept. A sample
    /// size present in only one table selects that table's row.
    pub fn select(
        &self,
        population_size: u64,
        z: f64,
        clean_truth: Option<f64>,
    ) -> Vec<BestChoice> {
        let mut best: BTreeMap<u32, BestChoice> = BTreeMap::new();

        for (method, results) in &self.tables {
            for result in results.iter() {
                let estimate = PointEstimate {
                    mean: result.mean,
                    variance: result.variance,
                };
                let k = result.sample_size as usize;
                let ci = ConfidenceInterval::new(estimate, k, population_size, z);
                let candidate = BestChoice {
                    sample_size: result.sample_size,
                    method: *method,
                    mean: result.mean,
                    variance: result.variance,
                    ci,
                    ci_width_pct: clean_truth
                        .filter(|t| *t != 0.0)
                        .map(|t| ci.width() / t.abs() * 100.0),
                };

                match best.get(&result.sample_size) {
                    Some(current) if !(ci.width() < current.ci.width()) => {}
                    _ => {
                        best.insert(result.sample_size, candidate);
                    }
                }
            }
        }

        best.into_values().collect()
    }
}

impl Default for Candidates<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(sample_size: u32, mean: f64, variance: f64) -> SampleResult {
        SampleResult { sample_size, mean, variance }
    }

    #[test]
    fn test_narrower_interval_wins() {
        let raw = vec![result(500, 10.0, 400.0), result(1000, 11.0, 1.0)];
        let norm = vec![result(500, 12.0, 100.0), result(1000, 13.0, 9.0)];
        let best = Candidates::new()
            .add(Method::RawSc, &raw)
            .add(Method::NormalizedSc, &norm)
            .select(1_000_000, 1.96, None);

        assert_eq!(best.len(), 2);
        assert_eq!(best[0].sample_size, 500);
        assert_eq!(best[0].method, Method::NormalizedSc);
        assert_eq!(best[1].method, Method::RawSc);
        assert!(best[0].ci_width_pct.is_none());
    }

    #[test]
    fn test_tie_keeps_first_table() {
        let raw = vec![result(500, 10.0, 4.0)];
        let norm = vec![result(500, 12.0, 4.0)];
        let best = Candidates::new()
            .add(Method::RawSc, &raw)
            .add(Method::NormalizedSc, &norm)
            .select(1_000, 1.96, None);
        assert_eq!(best[0].method, Method::RawSc);
    }

    #[test]
    fn test_missing_rows_fall_back_to_available_table() {
        let raw = vec![result(500, 10.0, 4.0)];
        let norm = vec![result(1000, 12.0, 4.0)];
        let best = Candidates::new()
            .add(Method::RawSc, &raw)
            .add(Method::NormalizedSc, &norm)
            .select(1_000_000, 1.96, None);
        let methods: Vec<Method> = best.iter().map(|b| b.method).collect();
        assert_eq!(methods, vec![Method::RawSc, Method::NormalizedSc]);
    }

    #[test]
    fn test_width_percentage_of_clean_truth() {
        // sample covers the population, so fpc = 1 and stderr = sqrt(4 / 4)
        let raw = vec![result(4, 10.0, 4.0)];
        let best = Candidates::new().add(Method::RawSc, &raw).select(4, 2.0, Some(8.0));
        assert!((best[0].ci.width() - 4.0).abs() < 1e-12);
        assert!((best[0].ci_width_pct.unwrap() - 50.0).abs() < 1e-9);
    }
}
