use crate::domain::{Aggregate, Method, SampleResult};
use crate::pipeline::processing::parser::ParsedSample;
use crate::pipeline::processing::selection::BestChoice;

/// Where the driver finds the samples, one per target sample size.
pub trait SampleSourcePort {
    /// Available sample sizes, ascending
    fn sample_sizes(&self) -> anyhow::Result<Vec<u32>>;

    fn load_sample(&self, sample_size: u32) -> anyhow::Result<ParsedSample>;
}

/// Sink for one complete result table per (method, aggregate).
pub trait ResultOutputPort {
    fn write_results(
        &self,
        method: Method,
        aggregate: Aggregate,
        results: &[SampleResult],
    ) -> anyhow::Result<()>;
}

/// Reads result tables back. `Ok(None)` means the table was never produced.
pub trait ResultInputPort {
    fn read_results(
        &self,
        method: Method,
        aggregate: Aggregate,
    ) -> anyhow::Result<Option<Vec<SampleResult>>>;
}

pub trait BestOutputPort {
    fn write_best(&self, aggregate: Aggregate, choices: &[BestChoice]) -> anyhow::Result<()>;
}
