use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::DatasetProfile;
use crate::constants::GENERATION_SUMMARY_FILE;
use crate::pipeline::generation::sampling::SampleSinks;
use crate::pipeline::generation::{DirtyDataGenerator, GenerationContext, GenerationStats};

/// Turns a clean source table into the augmented dirty population plus one
/// sample file per configured size.
pub struct GenerateUseCase {
    profile: DatasetProfile,
    generator: DirtyDataGenerator,
}

impl GenerateUseCase {
    pub fn new(profile: DatasetProfile) -> Self {
        let generator = DirtyDataGenerator::from_profile(&profile);
        Self { profile, generator }
    }

    /// Expected clean row count, from the profile or a counting pre-pass
    pub fn expected_rows(&self, input: &Path) -> Result<u64> {
        if let Some(rows) = self.profile.sampling.expected_rows {
            return Ok(rows);
        }
        let file =
            File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
        let rows = self.generator.count_source_rows(BufReader::new(file))?;
        info!("Counted {} source rows in {}", rows, input.display());
        Ok(rows)
    }

    /// Without a seed the run draws from OS entropy and is not reproducible.
    pub fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        seed: Option<u64>,
    ) -> Result<GenerationStats> {
        let expected_rows = self.expected_rows(input)?;

        fs::create_dir_all(output_dir).with_context(|| {
            format!("Failed to create output directory {}", output_dir.display())
        })?;
        let sinks = SampleSinks::create_in_dir(
            output_dir,
            &self.profile.file_prefix,
            &self.profile.sampling.sample_sizes,
        )
        .context("Failed to create output files")?;

        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let duplication_prob = self.profile.corruption.duplication_prob;
        let ctx = GenerationContext::new(sinks, rng, expected_rows, duplication_prob);

        let file =
            File::open(input).with_context(|| format!("Failed to open {}", input.display()))?;
        let outcome = self
            .generator
            .run(BufReader::new(file), ctx)
            .with_context(|| format!("Generation from {} failed", input.display()))?;

        let summary_path = self.summary_path(output_dir);
        fs::write(&summary_path, serde_json::to_string_pretty(&outcome.stats)?)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;

        info!(
            "✅ Generated {} dirty rows for profile '{}' into {}",
            outcome.stats.dirty_population,
            self.profile.name,
            output_dir.display()
        );
        Ok(outcome.stats)
    }

    pub fn summary_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(GENERATION_SUMMARY_FILE)
    }
}
