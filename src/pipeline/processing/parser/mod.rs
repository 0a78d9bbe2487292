use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::config::{DatasetProfile, ValueFormat};
use crate::domain::AugmentedRecord;
use crate::error::Result;
use crate::pipeline::lines::decoded_lines;

/// Records read from one file plus the number of lines that were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSample {
    pub records: Vec<AugmentedRecord>,
    pub malformed_lines: usize,
}

/// Reads the pipe-delimited augmented record format written by the generator:
/// `clean_value | clean_preds.. | dirty_value | dirty_preds.. | duplication_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordParser {
    predicate_arity: usize,
    value_format: ValueFormat,
}

impl RecordParser {
    pub fn new(predicate_arity: usize, value_format: ValueFormat) -> Self {
        Self {
            predicate_arity,
            value_format,
        }
    }

    pub fn for_profile(profile: &DatasetProfile) -> Self {
        Self::new(profile.layout.predicate_arity(), profile.layout.value_format)
    }

    /// Fields in a well-formed line; extra trailing fields are tolerated
    pub fn field_count(&self) -> usize {
        3 + 2 * self.predicate_arity
    }

    /// Parse one line. Returns `None` when it is malformed.
    pub fn parse_line(&self, line: &str) -> Option<AugmentedRecord> {
        let parts: Vec<&str> = line.trim().split('|').map(str::trim).collect();
        if parts.len() < self.field_count() {
            return None;
        }
        let k = self.predicate_arity;

        let clean_value = self.value_format.parse(parts[0])?;
        let clean_predicate_fields = to_owned_fields(&parts[1..1 + k]);
        let dirty_value = self.value_format.parse(parts[1 + k])?;
        let dirty_predicate_fields = to_owned_fields(&parts[2 + k..2 + 2 * k]);
        let duplication_count = parse_duplication_count(parts[2 + 2 * k])?;

        Some(AugmentedRecord {
            clean_value,
            clean_predicate_fields,
            dirty_value,
            dirty_predicate_fields,
            duplication_count,
        })
    }

    /// Read every record from `reader`, skipping blank lines. Malformed
    /// lines, including ones that are not valid UTF-8, are counted and dropped.
    pub fn read_records<R: BufRead>(&self, reader: R) -> Result<ParsedSample> {
        let mut sample = ParsedSample::default();
        for line in decoded_lines(reader) {
            let Some(line) = line? else {
                sample.malformed_lines += 1;
                continue;
            };
            if line.trim().is_empty() {
                continue;
            }
            match self.parse_line(&line) {
                Some(record) => sample.records.push(record),
                None => sample.malformed_lines += 1,
            }
        }
        if sample.malformed_lines > 0 {
            debug!("Dropped {} malformed lines", sample.malformed_lines);
        }
        Ok(sample)
    }

    pub fn read_file(&self, path: &Path) -> Result<ParsedSample> {
        let file = File::open(path)?;
        self.read_records(BufReader::new(file))
    }
}

fn to_owned_fields(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Duplication counts are written as integers but older files store them as floats
fn parse_duplication_count(text: &str) -> Option<u32> {
    if let Ok(n) = text.parse::<u32>() {
        return (n >= 1).then_some(n);
    }
    let f = text.parse::<f64>().ok()?;
    if f.is_finite() && f >= 1.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
        Some(f as u32)
    } else {
        None
    }
}
