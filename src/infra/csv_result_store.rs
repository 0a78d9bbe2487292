use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::app::ports::{BestOutputPort, ResultInputPort, ResultOutputPort};
use crate::domain::{Aggregate, Method, SampleResult};
use crate::pipeline::processing::selection::BestChoice;

/// Result tables as CSV files in one directory:
/// `{method}_{aggregate}_results.csv` and `best_{aggregate}_results.csv`.
#[derive(Debug, Clone)]
pub struct CsvResultStore {
    dir: PathBuf,
}

#[derive(Serialize)]
struct BestRow {
    sample_size: u32,
    estimator: &'static str,
    mean: f64,
    variance: f64,
    ci_low: f64,
    ci_high: f64,
    ci_width: f64,
    ci_width_pct: Option<f64>,
}

impl From<&BestChoice> for BestRow {
    fn from(choice: &BestChoice) -> Self {
        Self {
            sample_size: choice.sample_size,
            estimator: choice.method.label(),
            mean: choice.mean,
            variance: choice.variance,
            ci_low: choice.ci.low,
            ci_high: choice.ci.high,
            ci_width: choice.ci.width(),
            ci_width_pct: choice.ci_width_pct,
        }
    }
}

impl CsvResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn results_path(&self, method: Method, aggregate: Aggregate) -> PathBuf {
        self.dir.join(format!("{}_{}_results.csv", method.as_str(), aggregate.as_str()))
    }

    pub fn best_path(&self, aggregate: Aggregate) -> PathBuf {
        self.dir.join(format!("best_{}_results.csv", aggregate.as_str()))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create results directory {}", self.dir.display()))
    }
}

const RESULT_COLUMNS: [&str; 3] = ["sample_size", "mean", "variance"];
const BEST_COLUMNS: [&str; 8] = [
    "sample_size",
    "estimator",
    "mean",
    "variance",
    "ci_low",
    "ci_high",
    "ci_width",
    "ci_width_pct",
];

/// Serialize `rows` to `path`. An empty table still gets its header, which
/// serde only emits alongside the first record.
fn write_rows<T: Serialize>(
    path: &Path,
    header: &[&str],
    rows: impl IntoIterator<Item = T>,
) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut written = 0;
    for row in rows {
        writer.serialize(row)?;
        written += 1;
    }
    if written == 0 {
        writer.write_record(header)?;
    }
    writer.flush()?;
    Ok(written)
}

impl ResultOutputPort for CsvResultStore {
    fn write_results(
        &self,
        method: Method,
        aggregate: Aggregate,
        results: &[SampleResult],
    ) -> Result<()> {
        self.ensure_dir()?;
        let path = self.results_path(method, aggregate);

        let mut rows = results.to_vec();
        rows.sort_by_key(|r| r.sample_size);
        let written = write_rows(&path, &RESULT_COLUMNS, &rows)?;

        info!("Wrote {} rows to {}", written, path.display());
        Ok(())
    }
}

impl ResultInputPort for CsvResultStore {
    fn read_results(
        &self,
        method: Method,
        aggregate: Aggregate,
    ) -> Result<Option<Vec<SampleResult>>> {
        let path = self.results_path(method, aggregate);
        if !path.exists() {
            warn!("Result file {} not found", path.display());
            return Ok(None);
        }

        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut rows = Vec::new();
        for row in reader.deserialize() {
            let row: SampleResult = row.with_context(|| format!("Bad row in {}", path.display()))?;
            rows.push(row);
        }
        Ok(Some(rows))
    }
}

impl BestOutputPort for CsvResultStore {
    fn write_best(&self, aggregate: Aggregate, choices: &[BestChoice]) -> Result<()> {
        self.ensure_dir()?;
        let path = self.best_path(aggregate);
        let written = write_rows(&path, &BEST_COLUMNS, choices.iter().map(BestRow::from))?;
        info!("Wrote {} best-estimator rows to {}", written, path.display());
        Ok(())
    }
}
