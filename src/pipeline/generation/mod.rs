//! Dirty-data generator: corrupts and duplicates a clean source table and
//! samples the result into one stream per target sample size.

pub mod corruption;
pub mod sampling;

use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::config::{CorruptionConfig, DatasetProfile, SourceLayout};
use crate::constants::{self, DUPLICATED_COPIES};
use crate::error::Result;
use crate::metrics::GeneratorMetrics;
use crate::pipeline::lines::decoded_lines;
use sampling::{InclusionRule, SampleSinks, SinkOutputs};

/// The fields the generator reads from one clean source row.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    pub value: String,
    pub predicate_fields: Vec<String>,
    /// False when an optional value field was missing or empty
    pub has_value: bool,
}

impl SourceRow {
    /// Parse a pipe-delimited row. Returns `None` for blank rows, rows with
    /// too few fields, or a value that does not parse under the layout.
    /// Under an optional-value layout a missing or empty value is kept as the
    /// placeholder and the presence field is appended to the predicate fields.
    pub fn parse(line: &str, layout: &SourceLayout) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let fields: Vec<&str> = line.split('|').collect();
        if fields.len() < layout.required_fields() {
            return None;
        }

        let value = fields
            .get(layout.value_field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());
        let has_value = value.is_some();
        let value = match value {
            Some(value) => {
                layout.value_format.parse(value)?;
                value.to_string()
            }
            None if layout.optional_value => constants::MISSING_VALUE.to_string(),
            None => return None,
        };

        let mut predicate_fields: Vec<String> = layout
            .predicate_fields
            .iter()
            .map(|&i| fields[i].trim().to_string())
            .collect();
        if layout.optional_value {
            let flag = if has_value {
                constants::VALUE_PRESENT
            } else {
                constants::VALUE_ABSENT
            };
            predicate_fields.push(flag.to_string());
        }

        Some(Self {
            value,
            predicate_fields,
            has_value,
        })
    }
}

/// One generated row, kept textual so values are written exactly as read.
#[derive(Debug, Clone, PartialEq)]
pub struct DirtyRow {
    pub clean_value: String,
    pub clean_predicate_fields: Vec<String>,
    pub dirty_value: String,
    pub dirty_predicate_fields: Vec<String>,
    pub duplication_count: u32,
    /// A value or predicate field was rewritten
    pub changed: bool,
}

impl DirtyRow {
    /// `clean_value|clean_preds..|dirty_value|dirty_preds..|dup\n`
    pub fn to_line(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(3 + 2 * self.clean_predicate_fields.len());
        parts.push(&self.clean_value);
        parts.extend(self.clean_predicate_fields.iter().map(String::as_str));
        parts.push(&self.dirty_value);
        parts.extend(self.dirty_predicate_fields.iter().map(String::as_str));
        let dup = self.duplication_count.to_string();
        parts.push(&dup);
        let mut line = parts.join("|");
        line.push('\n');
        line
    }
}

/// Counters reported at the end of a generation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    pub total_lines: u64,
    pub skipped_lines: u64,
    pub value_changes: u64,
    pub duplicated_rows: u64,
    /// Sum of duplication counts written to the full dirty file
    pub dirty_population: u64,
    pub expected_rows: u64,
    pub sample_rows: BTreeMap<u32, u64>,
}

/// Mutable state of one run: output streams, random source, inclusion rule
/// and counters. Passed through every row-processing call.
pub struct GenerationContext<W: Write, R: Rng> {
    pub sinks: SampleSinks<W>,
    pub rng: R,
    pub inclusion: InclusionRule,
    pub stats: GenerationStats,
}

impl<W: Write, R: Rng> GenerationContext<W, R> {
    pub fn new(sinks: SampleSinks<W>, rng: R, expected_rows: u64, duplication_prob: f64) -> Self {
        let stats = GenerationStats {
            expected_rows,
            sample_rows: sinks.sample_sizes().into_iter().map(|s| (s, 0)).collect(),
            ..GenerationStats::default()
        };
        Self {
            sinks,
            rng,
            inclusion: InclusionRule::new(expected_rows, duplication_prob),
            stats,
        }
    }
}

/// What a finished run hands back: counters and the flushed streams.
pub struct GenerationOutcome<W> {
    pub stats: GenerationStats,
    pub outputs: SinkOutputs<W>,
}

pub struct DirtyDataGenerator {
    layout: SourceLayout,
    corruption: CorruptionConfig,
}

impl DirtyDataGenerator {
    pub fn new(layout: SourceLayout, corruption: CorruptionConfig) -> Self {
        Self { layout, corruption }
    }

    pub fn from_profile(profile: &DatasetProfile) -> Self {
        Self::new(profile.layout.clone(), profile.corruption.clone())
    }

    pub fn layout(&self) -> &SourceLayout {
        &self.layout
    }

    /// Apply the three independent corruption decisions to one row.
    ///
    /// Draw order is fixed (value, predicate, duplication) so a seeded run is
    /// reproducible. A row without a value skips the value draw.
    pub fn corrupt<R: Rng>(&self, row: &SourceRow, rng: &mut R) -> DirtyRow {
        let c = &self.corruption;
        let mut dirty_value = row.value.clone();
        let mut dirty_predicate_fields = row.predicate_fields.clone();
        let mut changed = false;

        if row.has_value && rng.gen::<f64>() < c.value_error_prob {
            dirty_value = c.value_corruption.apply(&row.value, &c.confusion, rng);
            changed |= dirty_value != row.value;
        }

        if rng.gen::<f64>() < c.condition_error_prob {
            changed |= c.predicate_corruption.apply(&mut dirty_predicate_fields, rng);
        }

        let duplication_count = if rng.gen::<f64>() < c.duplication_prob {
            DUPLICATED_COPIES
        } else {
            1
        };

        DirtyRow {
            clean_value: row.value.clone(),
            clean_predicate_fields: row.predicate_fields.clone(),
            dirty_value,
            dirty_predicate_fields,
            duplication_count,
            changed,
        }
    }

    /// Process one source line against the run context. Malformed lines are
    /// skipped without touching `total_lines`.
    pub fn process_line<W: Write, R: Rng>(
        &self,
        line: &str,
        ctx: &mut GenerationContext<W, R>,
    ) -> Result<Option<DirtyRow>> {
        if line.trim().is_empty() {
            return Ok(None);
        }
        let Some(source) = SourceRow::parse(line, &self.layout) else {
            ctx.stats.skipped_lines += 1;
            GeneratorMetrics::record_row_skipped();
            debug!("Skipping malformed source row");
            return Ok(None);
        };

        ctx.stats.total_lines += 1;
        let row = self.corrupt(&source, &mut ctx.rng);
        if row.changed {
            ctx.stats.value_changes += 1;
        }
        if row.duplication_count > 1 {
            ctx.stats.duplicated_rows += 1;
        }
        ctx.stats.dirty_population += u64::from(row.duplication_count);

        let line = row.to_line();
        let mut joined = 0;
        for size in ctx.sinks.sample_sizes() {
            let p = ctx.inclusion.probability(size, row.duplication_count);
            if ctx.rng.gen::<f64>() < p {
                ctx.sinks.write_sample(size, &line)?;
                *ctx.stats.sample_rows.entry(size).or_insert(0) += 1;
                joined += 1;
            }
        }
        ctx.sinks.write_all_dirty(&line)?;

        GeneratorMetrics::record_row(row.changed, row.duplication_count > 1, joined);
        Ok(Some(row))
    }

    /// Single forward pass over `input`. On error the context is dropped,
    /// which flushes every stream written so far.
    #[instrument(skip_all, fields(expected_rows = ctx.stats.expected_rows))]
    pub fn run<I: BufRead, W: Write, R: Rng>(
        &self,
        input: I,
        mut ctx: GenerationContext<W, R>,
    ) -> Result<GenerationOutcome<W>> {
        let started = Instant::now();
        for line in decoded_lines(input) {
            match line? {
                Some(line) => {
                    self.process_line(&line, &mut ctx)?;
                }
                None => {
                    ctx.stats.skipped_lines += 1;
                    GeneratorMetrics::record_row_skipped();
                    debug!("Skipping source row that is not valid UTF-8");
                }
            }
        }

        let GenerationContext { sinks, stats, .. } = ctx;
        let outputs = sinks.finish()?;

        GeneratorMetrics::record_run(stats.dirty_population, started.elapsed().as_secs_f64());
        info!(
            total_lines = stats.total_lines,
            value_changes = stats.value_changes,
            duplicated_rows = stats.duplicated_rows,
            skipped_lines = stats.skipped_lines,
            dirty_population = stats.dirty_population,
            "Generation finished"
        );
        Ok(GenerationOutcome { stats, outputs })
    }

    /// Count well-formed rows, used when the profile has no expected row count
    pub fn count_source_rows<I: BufRead>(&self, input: I) -> Result<u64> {
        let mut count = 0;
        for line in decoded_lines(input) {
            if let Some(line) = line? {
                if SourceRow::parse(&line, &self.layout).is_some() {
                    count += 1;
                }
            }
        }
        Ok(count)
    }
}
