use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::app::ports::{BestOutputPort, ResultInputPort};
use crate::domain::{Aggregate, AggregateSet, Method, SampleResult};
use crate::pipeline::processing::selection::{BestChoice, Candidates};

const COMPARED_METHODS: [Method; 2] = [Method::RawSc, Method::NormalizedSc];

/// Compares RawSC and NormalizedSC result tables and keeps, per sample size,
/// the one with the narrower confidence interval.
pub struct BestUseCase {
    input: Box<dyn ResultInputPort>,
    output: Box<dyn BestOutputPort>,
    population_size: u64,
    z: f64,
    clean_truth: Option<AggregateSet<f64>>,
}

impl BestUseCase {
    pub fn new(
        input: Box<dyn ResultInputPort>,
        output: Box<dyn BestOutputPort>,
        population_size: u64,
        z: f64,
    ) -> Self {
        Self {
            input,
            output,
            population_size,
            z,
            clean_truth: None,
        }
    }

    /// Known clean aggregates, used to report CI width as a percentage
    pub fn with_clean_truth(mut self, clean_truth: Option<AggregateSet<f64>>) -> Self {
        self.clean_truth = clean_truth;
        self
    }

    pub fn run(&self) -> Result<BTreeMap<Aggregate, Vec<BestChoice>>> {
        let mut report = BTreeMap::new();

        for aggregate in Aggregate::ALL {
            let mut tables: Vec<(Method, Vec<SampleResult>)> = Vec::new();
            for method in COMPARED_METHODS {
                match self.input.read_results(method, aggregate)? {
                    Some(rows) => tables.push((method, rows)),
                    None => warn!("No {} results for {}", method, aggregate),
                }
            }
            if tables.is_empty() {
                warn!("Skipping {}: no result tables", aggregate);
                continue;
            }

            let candidates = tables
                .iter()
                .fold(Candidates::new(), |c, (method, rows)| c.add(*method, rows));
            let truth = self.clean_truth.map(|t| t.get(aggregate));
            let choices = candidates.select(self.population_size, self.z, truth);

            self.output.write_best(aggregate, &choices)?;
            info!("Selected best estimator for {} sample sizes ({})", choices.len(), aggregate);
            report.insert(aggregate, choices);
        }

        Ok(report)
    }
}
