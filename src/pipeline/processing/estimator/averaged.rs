use tracing::debug;

use crate::domain::{AggregateSet, AugmentedRecord, Method, PopulationParameters};
use crate::error::EstimateError;

use super::stats;
use super::{CorrectionEstimator, Estimate, SampleEstimator};

/// Split into `parts` contiguous subsets; the last one absorbs the remainder.
pub fn split_into_subsets(sample: &[AugmentedRecord], parts: usize) -> Vec<&[AugmentedRecord]> {
    if parts == 0 {
        return Vec::new();
    }
    let chunk = sample.len() / parts;
    (0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 < parts { start + chunk } else { sample.len() };
            &sample[start..end]
        })
        .collect()
}

/// RawSC run independently on contiguous subsets of a sample.
///
/// The reported mean is the mean of the subset estimates and the variance is
/// their spread (ddof = 1), not the row-level variance. Subsets without an
/// estimate are left out.
#[derive(Debug, Clone)]
pub struct AveragedEstimator {
    inner: CorrectionEstimator,
    subsets: usize,
}

impl AveragedEstimator {
    pub fn new(params: &PopulationParameters, subsets: usize) -> Self {
        Self {
            inner: CorrectionEstimator::raw(params),
            subsets: subsets.max(1),
        }
    }

    pub fn subsets(&self) -> usize {
        self.subsets
    }
}

impl SampleEstimator for AveragedEstimator {
    fn method(&self) -> Method {
        Method::RawScAveraged
    }

    fn estimate(&self, sample: &[AugmentedRecord]) -> Result<Estimate, EstimateError> {
        if sample.is_empty() {
            return Err(EstimateError::EmptySample);
        }

        let mut subset_estimates = Vec::with_capacity(self.subsets);
        for (idx, subset) in split_into_subsets(sample, self.subsets).into_iter().enumerate() {
            match self.inner.estimate(subset) {
                Ok(est) => subset_estimates.push(est),
                Err(e) => debug!("Subset {}/{} produced no result: {}", idx + 1, self.subsets, e),
            }
        }
        if subset_estimates.is_empty() {
            return Err(EstimateError::NoUsableSubset { subsets: self.subsets });
        }

        let aggregates = AggregateSet::from_fn(|agg| {
            let means: Vec<f64> =
                subset_estimates.iter().map(|e| e.aggregates.get(agg).mean).collect();
            stats::point_estimate(&means)
        });

        Ok(Estimate {
            sample_rows: sample.len(),
            aggregates,
        })
    }
}
