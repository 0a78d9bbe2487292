use serde::{Deserialize, Serialize};

use crate::domain::PointEstimate;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with `ddof = 1`. Fewer than two values give 0.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    ss / (values.len() - 1) as f64
}

pub fn point_estimate(values: &[f64]) -> PointEstimate {
    PointEstimate {
        mean: mean(values),
        variance: sample_variance(values),
    }
}

/// Finite population correction `sqrt((N - K) / (N - 1))`, or 1 when the
/// sample covers the population.
pub fn finite_population_correction(sample_rows: usize, population_size: u64) -> f64 {
    let k = sample_rows as f64;
    let n = population_size as f64;
    if k < n && n > 1.0 {
        ((n - k) / (n - 1.0)).sqrt()
    } else {
        1.0
    }
}

/// `mean ± z * sqrt(variance / K) * fpc`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub low: f64,
    pub high: f64,
}

impl ConfidenceInterval {
    pub fn new(estimate: PointEstimate, sample_rows: usize, population_size: u64, z: f64) -> Self {
        let half_width = if sample_rows == 0 {
            f64::INFINITY
        } else {
            let stderr = (estimate.variance.max(0.0) / sample_rows as f64).sqrt();
            z * stderr * finite_population_correction(sample_rows, population_size)
        };
        Self {
            low: estimate.mean - half_width,
            high: estimate.mean + half_width,
        }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}
