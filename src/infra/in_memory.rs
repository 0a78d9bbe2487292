use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::app::ports::{BestOutputPort, ResultInputPort, ResultOutputPort, SampleSourcePort};
use crate::domain::{Aggregate, AugmentedRecord, Method, SampleResult};
use crate::pipeline::processing::parser::ParsedSample;
use crate::pipeline::processing::selection::BestChoice;

/// Samples held in memory, keyed by sample size
#[derive(Debug, Clone, Default)]
pub struct InMemorySampleSource {
    samples: BTreeMap<u32, Vec<AugmentedRecord>>,
}

impl InMemorySampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sample_size: u32, records: Vec<AugmentedRecord>) {
        self.samples.insert(sample_size, records);
    }
}

impl SampleSourcePort for InMemorySampleSource {
    fn sample_sizes(&self) -> Result<Vec<u32>> {
        Ok(self.samples.keys().copied().collect())
    }

    fn load_sample(&self, sample_size: u32) -> Result<ParsedSample> {
        let records = self
            .samples
            .get(&sample_size)
            .cloned()
            .ok_or_else(|| anyhow!("No sample of size {}", sample_size))?;
        Ok(ParsedSample {
            records,
            malformed_lines: 0,
        })
    }
}

/// Result and best-estimator tables kept in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResultStore {
    results: Arc<Mutex<HashMap<(Method, Aggregate), Vec<SampleResult>>>>,
    best: Arc<Mutex<HashMap<Aggregate, Vec<BestChoice>>>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn best(&self, aggregate: Aggregate) -> Result<Option<Vec<BestChoice>>> {
        let best = self.best.lock().map_err(|_| anyhow!("best table lock poisoned"))?;
        Ok(best.get(&aggregate).cloned())
    }
}

impl ResultOutputPort for InMemoryResultStore {
    fn write_results(
        &self,
        method: Method,
        aggregate: Aggregate,
        results: &[SampleResult],
    ) -> Result<()> {
        let mut tables = self.results.lock().map_err(|_| anyhow!("result table lock poisoned"))?;
        let mut rows = results.to_vec();
        rows.sort_by_key(|r| r.sample_size);
        tables.insert((method, aggregate), rows);
        debug!("Stored {} {} results in memory", method, aggregate);
        Ok(())
    }
}

impl ResultInputPort for InMemoryResultStore {
    fn read_results(
        &self,
        method: Method,
        aggregate: Aggregate,
    ) -> Result<Option<Vec<SampleResult>>> {
        let tables = self.results.lock().map_err(|_| anyhow!("result table lock poisoned"))?;
        Ok(tables.get(&(method, aggregate)).cloned())
    }
}

impl BestOutputPort for InMemoryResultStore {
    fn write_best(&self, aggregate: Aggregate, choices: &[BestChoice]) -> Result<()> {
        let mut best = self.best.lock().map_err(|_| anyhow!("best table lock poisoned"))?;
        best.insert(aggregate, choices.to_vec());
        Ok(())
    }
}
