use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use crate::config::DatasetProfile;
use crate::pipeline::processing::parser::RecordParser;
use crate::pipeline::processing::truth::PopulationSummary;

/// Computes exact clean and dirty aggregates over a generated population.
pub struct TruthUseCase {
    profile: DatasetProfile,
}

impl TruthUseCase {
    pub fn new(profile: DatasetProfile) -> Self {
        Self { profile }
    }

    pub fn run(&self, population: &Path, output: Option<&Path>) -> Result<PopulationSummary> {
        let parsed = RecordParser::for_profile(&self.profile)
            .read_file(population)
            .with_context(|| format!("Failed to read population {}", population.display()))?;
        if parsed.malformed_lines > 0 {
            warn!("{}: skipped {} malformed lines", population.display(), parsed.malformed_lines);
        }

        let predicate = &self.profile.estimation.predicate;
        let summary = PopulationSummary::from_records(&parsed.records, predicate);
        if summary.all_dirty.is_none() {
            warn!("No dirty row matches the predicate; NormalizedSC needs all_dirty from config");
        }

        if let Some(path) = output {
            summary
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Population summary written to {}", path.display());
        }
        Ok(summary)
    }
}
