use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants;

/// Online inclusion rule for the per-target sample streams.
///
/// A row with duplication count `d` enters the stream for target size `n`
/// with probability `n * d / T`, where `T` is the expected dirty population
/// size `expected_rows * (1 + p_dup)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InclusionRule {
    expected_dirty_population: f64,
}

impl InclusionRule {
    pub fn new(expected_rows: u64, duplication_prob: f64) -> Self {
        Self {
            expected_dirty_population: expected_rows as f64 * (1.0 + duplication_prob),
        }
    }

    pub fn expected_dirty_population(&self) -> f64 {
        self.expected_dirty_population
    }

    /// May exceed 1 for tiny populations, in which case the row is always kept
    pub fn probability(&self, target_size: u32, duplication_count: u32) -> f64 {
        if self.expected_dirty_population <= 0.0 {
            return 1.0;
        }
        f64::from(target_size) * f64::from(duplication_count) / self.expected_dirty_population
    }
}

fn closed_stream() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "dirty population stream already closed")
}

/// Output streams owned by one generation run: the full dirty population
/// plus one stream per target sample size.
///
/// Streams are flushed on [`SampleSinks::finish`]; if the run is abandoned
/// early they are flushed on drop instead.
pub struct SampleSinks<W: Write> {
    all_dirty: Option<W>,
    samples: BTreeMap<u32, W>,
}

/// Streams handed back after a successful flush.
pub struct SinkOutputs<W> {
    pub all_dirty: W,
    pub samples: BTreeMap<u32, W>,
}

impl<W: Write> SampleSinks<W> {
    pub fn new(all_dirty: W, samples: BTreeMap<u32, W>) -> Self {
        Self {
            all_dirty: Some(all_dirty),
            samples,
        }
    }

    pub fn sample_sizes(&self) -> Vec<u32> {
        self.samples.keys().copied().collect()
    }

    pub fn write_all_dirty(&mut self, line: &str) -> io::Result<()> {
        match self.all_dirty.as_mut() {
            Some(w) => w.write_all(line.as_bytes()),
            None => Err(closed_stream()),
        }
    }

    pub fn write_sample(&mut self, size: u32, line: &str) -> io::Result<()> {
        match self.samples.get_mut(&size) {
            Some(w) => w.write_all(line.as_bytes()),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no sample stream for size {}", size),
            )),
        }
    }

    /// Flush every stream and hand them back
    pub fn finish(mut self) -> io::Result<SinkOutputs<W>> {
        let mut all_dirty = self
            .all_dirty
            .take()
            .ok_or_else(closed_stream)?;
        let mut samples = std::mem::take(&mut self.samples);

        all_dirty.flush()?;
        for w in samples.values_mut() {
            w.flush()?;
        }
        Ok(SinkOutputs { all_dirty, samples })
    }
}

impl<W: Write> Drop for SampleSinks<W> {
    fn drop(&mut self) {
        if let Some(w) = self.all_dirty.as_mut() {
            if let Err(e) = w.flush() {
                warn!("Failed to flush dirty population stream: {}", e);
            }
        }
        for (size, w) in self.samples.iter_mut() {
            if let Err(e) = w.flush() {
                warn!("Failed to flush sample stream {}: {}", size, e);
            }
        }
    }
}

impl SampleSinks<BufWriter<File>> {
    /// Create `output_dir/<all-dirty file>` and one sample file per size
    pub fn create_in_dir(output_dir: &Path, file_prefix: &str, sizes: &[u32]) -> io::Result<Self> {
        fs::create_dir_all(output_dir)?;

        let all_dirty_path = output_dir.join(constants::ALL_DIRTY_FILE);
        let all_dirty = BufWriter::new(File::create(&all_dirty_path)?);
        debug!("Opened dirty population file {:?}", all_dirty_path);

        let mut samples = BTreeMap::new();
        for &size in sizes {
            let path = sample_path(output_dir, file_prefix, size);
            samples.insert(size, BufWriter::new(File::create(&path)?));
        }
        debug!("Opened {} sample files in {:?}", samples.len(), output_dir);

        Ok(Self::new(all_dirty, samples))
    }
}

pub fn sample_path(output_dir: &Path, file_prefix: &str, size: u32) -> PathBuf {
    output_dir.join(constants::sample_file_name(file_prefix, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_inclusion_probability_scales_with_duplication() {
        let rule = InclusionRule::new(1000, 0.2);
        assert!((rule.expected_dirty_population() - 1200.0).abs() < 1e-9);
        assert!((rule.probability(120, 1) - 0.1).abs() < 1e-12);
        assert!((rule.probability(120, 2) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_empty_population_always_includes() {
        let rule = InclusionRule::new(0, 0.2);
        assert_eq!(rule.probability(500, 1), 1.0);
    }

    #[test]
    fn test_finish_returns_written_streams() {
        let mut samples = BTreeMap::new();
        samples.insert(10, Vec::new());
        samples.insert(20, Vec::new());
        let mut sinks = SampleSinks::new(Vec::new(), samples);

        sinks.write_all_dirty("a\n").unwrap();
        sinks.write_sample(20, "b\n").unwrap();
        assert!(sinks.write_sample(30, "c\n").is_err());
        assert_eq!(sinks.sample_sizes(), vec![10, 20]);

        let out = sinks.finish().unwrap();
        assert_eq!(out.all_dirty, b"a\n");
        assert!(out.samples[&10].is_empty());
        assert_eq!(out.samples[&20], b"b\n");
    }

    #[test]
    fn test_dropped_sinks_flush_files() {
        let dir = tempdir().unwrap();
        {
            let mut sinks = SampleSinks::create_in_dir(dir.path(), "t", &[5]).unwrap();
            sinks.write_all_dirty("1|A|1|A|1\n").unwrap();
            sinks.write_sample(5, "1|A|1|A|1\n").unwrap();
            // dropped without finish, as on an early error return
        }
        let sample = fs::read_to_string(sample_path(dir.path(), "t", 5)).unwrap();
        assert_eq!(sample, "1|A|1|A|1\n");
        let all = fs::read_to_string(dir.path().join(constants::ALL_DIRTY_FILE)).unwrap();
        assert_eq!(all, "1|A|1|A|1\n");
    }
}
