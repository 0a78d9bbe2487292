use anyhow::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::app::ports::SampleSourcePort;
use crate::constants::SAMPLE_FILE_EXTENSION;
use crate::pipeline::generation::sampling::sample_path;
use crate::pipeline::processing::parser::{ParsedSample, RecordParser};

/// Sample files `sample_{prefix}_{size}.tbl` in one directory.
pub struct DirectorySampleSource {
    dir: PathBuf,
    file_prefix: String,
    parser: RecordParser,
    pattern: Regex,
}

impl DirectorySampleSource {
    pub fn new(dir: impl Into<PathBuf>, file_prefix: &str, parser: RecordParser) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"^sample_{}_(\d+)\.{}$",
            regex::escape(file_prefix),
            regex::escape(SAMPLE_FILE_EXTENSION)
        ))?;
        Ok(Self {
            dir: dir.into(),
            file_prefix: file_prefix.to_string(),
            parser,
            pattern,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn size_of(&self, file_name: &str) -> Option<u32> {
        let caps = self.pattern.captures(file_name)?;
        caps.get(1)?.as_str().parse().ok()
    }
}

impl SampleSourcePort for DirectorySampleSource {
    fn sample_sizes(&self) -> Result<Vec<u32>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read sample directory {}", self.dir.display()))?;

        let mut sizes = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match self.size_of(name) {
                Some(0) => warn!("Ignoring sample file with size 0: {}", name),
                Some(size) => sizes.push(size),
                None => debug!("Ignoring {}", name),
            }
        }
        sizes.sort_unstable();
        Ok(sizes)
    }

    fn load_sample(&self, sample_size: u32) -> Result<ParsedSample> {
        let path = sample_path(&self.dir, &self.file_prefix, sample_size);
        let sample = self
            .parser
            .read_file(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if sample.malformed_lines > 0 {
            warn!("{}: skipped {} malformed lines", path.display(), sample.malformed_lines);
        }
        Ok(sample)
    }
}
