use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::constants;
use crate::domain::{AggregateSet, Condition, PopulationParameters, Predicate};
use crate::error::{Result, SampleCleanError};
use crate::pipeline::generation::corruption::{DigitConfusion, PredicateCorruption, ValueCorruption};

/// Top-level configuration file: named dataset profiles.
///
/// ```toml
/// [profiles.lineitem_small]
/// file_prefix = "lineitem"
/// [profiles.lineitem_small.layout]
/// value_field = 4
/// predicate_fields = [8, 9]
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub profiles: BTreeMap<String, DatasetProfile>,
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            SampleCleanError::Config(format!(
                "Failed to read config file '{}': {}",
                config_path.display(),
                e
            ))
        })?;

        let mut config: Config = toml::from_str(&config_content)?;
        for (name, profile) in config.profiles.iter_mut() {
            if profile.name.is_empty() {
                profile.name = name.clone();
            }
            profile.validate()?;
        }
        Ok(config)
    }

    /// Look a profile up in the file first, then among the built-ins.
    pub fn resolve_profile(&self, name: &str) -> Result<DatasetProfile> {
        if let Some(profile) = self.profiles.get(name) {
            return Ok(profile.clone());
        }
        DatasetProfile::builtin(name)
    }
}

/// Everything needed to generate and estimate one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    #[serde(default)]
    pub name: String,
    /// Sample files are named `sample_{file_prefix}_{size}.tbl`
    pub file_prefix: String,
    pub layout: SourceLayout,
    #[serde(default)]
    pub corruption: CorruptionConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub estimation: EstimationConfig,
}

/// Where the generator finds its fields in a clean source row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceLayout {
    pub value_field: usize,
    #[serde(default)]
    pub predicate_fields: Vec<usize>,
    #[serde(default)]
    pub value_format: ValueFormat,
    /// Keep rows whose value field is missing or empty. They carry the
    /// placeholder value and a trailing presence field set to absent.
    #[serde(default)]
    pub optional_value: bool,
}

impl SourceLayout {
    /// Number of predicate fields carried on each side of an augmented record
    pub fn predicate_arity(&self) -> usize {
        self.predicate_fields.len() + usize::from(self.optional_value)
    }

    /// Index of the presence field within the predicate fields, if any
    pub fn presence_field(&self) -> Option<usize> {
        self.optional_value.then_some(self.predicate_fields.len())
    }

    /// Minimum number of fields a source row needs
    pub fn required_fields(&self) -> usize {
        let value_field = (!self.optional_value).then_some(self.value_field);
        self.predicate_fields
            .iter()
            .copied()
            .chain(value_field)
            .max()
            .map(|i| i + 1)
            .unwrap_or(0)
    }
}

/// How the textual value field is turned into a number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    #[default]
    Number,
    /// ISO date; the numeric value is its leading four-digit year.
    /// The missing-value placeholder reads as zero.
    DateYear,
}

impl ValueFormat {
    pub fn parse(&self, text: &str) -> Option<f64> {
        let text = text.trim();
        match self {
            ValueFormat::Number => text.parse::<f64>().ok().filter(|v| v.is_finite()),
            ValueFormat::DateYear => {
                if text == constants::MISSING_VALUE {
                    return Some(0.0);
                }
                let year = text.get(..4)?;
                if !year.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                year.parse::<f64>().ok()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorruptionConfig {
    #[serde(default = "default_value_error_prob")]
    pub value_error_prob: f64,
    #[serde(default = "default_condition_error_prob")]
    pub condition_error_prob: f64,
    #[serde(default = "default_duplication_prob")]
    pub duplication_prob: f64,
    #[serde(default)]
    pub value_corruption: ValueCorruption,
    #[serde(default)]
    pub predicate_corruption: PredicateCorruption,
    #[serde(default)]
    pub confusion: DigitConfusion,
}

impl Default for CorruptionConfig {
    fn default() -> Self {
        Self {
            value_error_prob: constants::DEFAULT_VALUE_ERROR_PROB,
            condition_error_prob: constants::DEFAULT_CONDITION_ERROR_PROB,
            duplication_prob: constants::DEFAULT_DUPLICATION_PROB,
            value_corruption: ValueCorruption::default(),
            predicate_corruption: PredicateCorruption::default(),
            confusion: DigitConfusion::default(),
        }
    }
}

fn default_value_error_prob() -> f64 {
    constants::DEFAULT_VALUE_ERROR_PROB
}

fn default_condition_error_prob() -> f64 {
    constants::DEFAULT_CONDITION_ERROR_PROB
}

fn default_duplication_prob() -> f64 {
    constants::DEFAULT_DUPLICATION_PROB
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(default = "constants::default_sample_sizes")]
    pub sample_sizes: Vec<u32>,
    /// Clean source rows expected; counted with a pre-pass when absent
    #[serde(default)]
    pub expected_rows: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_sizes: constants::default_sample_sizes(),
            expected_rows: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimationConfig {
    /// Full dirty population size N
    #[serde(default)]
    pub population_size: Option<u64>,
    #[serde(default)]
    pub predicate: Predicate,
    #[serde(default)]
    pub all_dirty: Option<AggregateSet<f64>>,
    #[serde(default)]
    pub all_clean: Option<AggregateSet<f64>>,
    #[serde(default = "default_subset_count")]
    pub subset_count: usize,
    #[serde(default = "default_z_value")]
    pub z_value: f64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            population_size: None,
            predicate: Predicate::default(),
            all_dirty: None,
            all_clean: None,
            subset_count: constants::DEFAULT_SUBSET_COUNT,
            z_value: constants::DEFAULT_Z_VALUE,
        }
    }
}

fn default_subset_count() -> usize {
    constants::DEFAULT_SUBSET_COUNT
}

fn default_z_value() -> f64 {
    constants::DEFAULT_Z_VALUE
}

impl DatasetProfile {
    /// Built-in profiles reproducing the reference experiments
    pub fn builtin(name: &str) -> Result<Self> {
        match name {
            constants::TPCH_PROFILE => Ok(Self::tpch()),
            constants::YELLOW_TAXI_PROFILE => Ok(Self::yellow_taxi()),
            constants::PERSONDATA_PROFILE => Ok(Self::persondata()),
            other => Err(SampleCleanError::UnknownProfile(other.to_string())),
        }
    }

    /// TPC-H lineitem: quantity under `returnflag = 'A' AND linestatus = 'F'`
    pub fn tpch() -> Self {
        Self {
            name: constants::TPCH_PROFILE.to_string(),
            file_prefix: "lineitem".to_string(),
            layout: SourceLayout {
                value_field: 4,
                predicate_fields: vec![8, 9],
                value_format: ValueFormat::Number,
                optional_value: false,
            },
            corruption: CorruptionConfig {
                predicate_corruption: PredicateCorruption::Alphabet {
                    field: 0,
                    alphabet: ["A", "B", "C", "R", "N", "F"]
                        .iter()
                        .map(|s| s.to_string())
                        .collect(),
                },
                ..CorruptionConfig::default()
            },
            sampling: SamplingConfig {
                expected_rows: Some(6_000_000),
                ..SamplingConfig::default()
            },
            estimation: EstimationConfig {
                population_size: Some(7_201_871),
                predicate: Predicate::new(vec![
                    Condition { field: 0, equals: "A".to_string() },
                    Condition { field: 1, equals: "F".to_string() },
                ]),
                all_dirty: Some(AggregateSet { count: 1_657_329.0, sum: 52_998_967.0, avg: 31.97 }),
                all_clean: Some(AggregateSet { count: 1_478_493.0, sum: 37_734_107.0, avg: 25.52 }),
                ..EstimationConfig::default()
            },
        }
    }

    /// NYC yellow taxi trips: total amount under `passenger_count = 1`
    pub fn yellow_taxi() -> Self {
        Self {
            name: constants::YELLOW_TAXI_PROFILE.to_string(),
            file_prefix: "ytd".to_string(),
            layout: SourceLayout {
                value_field: 4,
                predicate_fields: vec![2],
                value_format: ValueFormat::Number,
                optional_value: false,
            },
            corruption: CorruptionConfig {
                predicate_corruption: PredicateCorruption::Flip {
                    field: 0,
                    when: "1".to_string(),
                    to: "2".to_string(),
                    otherwise: "1".to_string(),
                },
                ..CorruptionConfig::default()
            },
            sampling: SamplingConfig {
                expected_rows: Some(6_614_775),
                ..SamplingConfig::default()
            },
            estimation: EstimationConfig {
                population_size: Some(7_937_540),
                predicate: Predicate::new(vec![Condition { field: 0, equals: "1".to_string() }]),
                all_dirty: Some(AggregateSet {
                    count: 5_650_714.0,
                    sum: 196_872_450.28,
                    avg: 34.840279,
                }),
                all_clean: Some(AggregateSet {
                    count: 5_059_647.0,
                    sum: 138_787_132.59,
                    avg: 27.430201,
                }),
                ..EstimationConfig::default()
            },
        }
    }

    /// DBpedia person data flattened to `subject|birth_date` rows: birth year
    /// over persons with a known birth date. Persons without one stay in the
    /// population and fail the predicate.
    pub fn persondata() -> Self {
        Self {
            name: constants::PERSONDATA_PROFILE.to_string(),
            file_prefix: "persondata".to_string(),
            layout: SourceLayout {
                value_field: 1,
                predicate_fields: Vec::new(),
                value_format: ValueFormat::DateYear,
                optional_value: true,
            },
            corruption: CorruptionConfig {
                value_error_prob: constants::DEFAULT_YEAR_TRIGGER_PROB,
                condition_error_prob: 0.0,
                value_corruption: ValueCorruption::YearDigits {
                    per_digit_prob: constants::DEFAULT_YEAR_PER_DIGIT_PROB,
                },
                predicate_corruption: PredicateCorruption::None,
                ..CorruptionConfig::default()
            },
            sampling: SamplingConfig::default(),
            estimation: EstimationConfig {
                population_size: Some(1_021_408),
                predicate: Predicate::new(vec![Condition {
                    field: 0,
                    equals: constants::VALUE_PRESENT.to_string(),
                }]),
                ..EstimationConfig::default()
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.corruption;
        for (label, p) in [
            ("value_error_prob", c.value_error_prob),
            ("condition_error_prob", c.condition_error_prob),
            ("duplication_prob", c.duplication_prob),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(SampleCleanError::Config(format!(
                    "profile '{}': {} must be within [0, 1], got {}",
                    self.name, label, p
                )));
            }
        }
        if let Some(field) = c.predicate_corruption.field() {
            let corruptible = self.layout.predicate_fields.len();
            if field >= corruptible {
                return Err(SampleCleanError::Config(format!(
                    "profile '{}': predicate corruption targets field {} but only {} source \
                     predicate fields exist",
                    self.name, field, corruptible
                )));
            }
        }
        let arity = self.layout.predicate_arity();
        if let Some(cond) = self.estimation.predicate.conditions.iter().find(|c| c.field >= arity) {
            return Err(SampleCleanError::Config(format!(
                "profile '{}': predicate condition on field {} but records carry {} fields",
                self.name, cond.field, arity
            )));
        }
        if self.sampling.sample_sizes.iter().any(|&s| s == 0) {
            return Err(SampleCleanError::Config(format!(
                "profile '{}': sample sizes must be positive",
                self.name
            )));
        }
        if self.estimation.subset_count == 0 {
            return Err(SampleCleanError::Config(format!(
                "profile '{}': subset_count must be positive",
                self.name
            )));
        }
        Ok(())
    }

    /// Population constants for the estimators. Values from a population
    /// summary take precedence over the profile's own.
    pub fn population_parameters(
        &self,
        summary: Option<&PopulationSummaryOverride>,
    ) -> Result<PopulationParameters> {
        let population_size = summary
            .map(|s| s.population_size)
            .or(self.estimation.population_size)
            .ok_or_else(|| {
                SampleCleanError::MissingField("estimation.population_size".to_string())
            })?;
        let all_dirty = summary
            .and_then(|s| s.all_dirty)
            .or(self.estimation.all_dirty);

        Ok(PopulationParameters {
            population_size,
            predicate: self.estimation.predicate.clone(),
            all_dirty,
        })
    }

    /// Clean ground truth, preferring a population summary
    pub fn all_clean(
        &self,
        summary: Option<&PopulationSummaryOverride>,
    ) -> Option<AggregateSet<f64>> {
        summary.and_then(|s| s.all_clean).or(self.estimation.all_clean)
    }
}

/// The parts of a population summary that override profile constants.
#[derive(Debug, Clone, Copy)]
pub struct PopulationSummaryOverride {
    pub population_size: u64,
    pub all_dirty: Option<AggregateSet<f64>>,
    pub all_clean: Option<AggregateSet<f64>>,
}
