//! Exact aggregates over a full generated population.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::PopulationSummaryOverride;
use crate::domain::{AggregateSet, AugmentedRecord, Predicate};
use crate::error::Result;

/// Full-population facts the estimators are compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSummary {
    /// Logical rows in the population file
    pub rows: u64,
    /// Dirty population size N, the sum of duplication counts
    pub population_size: u64,
    /// Clean rows matching the predicate, each counted once
    pub all_clean: Option<AggregateSet<f64>>,
    /// Dirty rows matching the predicate, weighted by duplication count
    pub all_dirty: Option<AggregateSet<f64>>,
}

#[derive(Default)]
struct Accumulator {
    count: f64,
    sum: f64,
}

impl Accumulator {
    fn add(&mut self, value: f64, weight: f64) {
        self.count += weight;
        self.sum += value * weight;
    }

    fn finish(self) -> Option<AggregateSet<f64>> {
        (self.count > 0.0).then(|| AggregateSet {
            count: self.count,
            sum: self.sum,
            avg: self.sum / self.count,
        })
    }
}

impl PopulationSummary {
    pub fn from_records<'a, I>(records: I, predicate: &Predicate) -> Self
    where
        I: IntoIterator<Item = &'a AugmentedRecord>,
    {
        let mut rows = 0;
        let mut population_size = 0;
        let mut clean = Accumulator::default();
        let mut dirty = Accumulator::default();

        for record in records {
            rows += 1;
            population_size += u64::from(record.duplication_count);
            if predicate.matches_clean(record) {
                clean.add(record.clean_value, 1.0);
            }
            if predicate.matches_dirty(record) {
                dirty.add(record.dirty_value, f64::from(record.duplication_count));
            }
        }

        Self {
            rows,
            population_size,
            all_clean: clean.finish(),
            all_dirty: dirty.finish(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn as_override(&self) -> PopulationSummaryOverride {
        PopulationSummaryOverride {
            population_size: self.population_size,
            all_dirty: self.all_dirty,
            all_clean: self.all_clean,
        }
    }
}
