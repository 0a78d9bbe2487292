use serde::{Deserialize, Serialize};
use std::fmt;

/// One logical row of the population with its clean and dirty sides.
///
/// Produced once by the generator, read back by the parser, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentedRecord {
    pub clean_value: f64,
    pub clean_predicate_fields: Vec<String>,
    pub dirty_value: f64,
    pub dirty_predicate_fields: Vec<String>,
    /// Physical copies of this row in the dirty population (always >= 1)
    pub duplication_count: u32,
}

impl AugmentedRecord {
    /// A row whose dirty side equals its clean side and is not duplicated.
    pub fn uncorrupted(value: f64, predicate_fields: Vec<String>) -> Self {
        Self {
            clean_value: value,
            dirty_value: value,
            dirty_predicate_fields: predicate_fields.clone(),
            clean_predicate_fields: predicate_fields,
            duplication_count: 1,
        }
    }

    pub fn is_corrupted(&self) -> bool {
        self.clean_value != self.dirty_value
            || self.clean_predicate_fields != self.dirty_predicate_fields
    }
}

/// Equality test on one predicate field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Position within the record's predicate fields
    pub field: usize,
    pub equals: String,
}

impl Condition {
    /// Numeric fields compare as numbers so `1` matches `1.0`.
    pub fn matches(&self, fields: &[String]) -> bool {
        let Some(value) = fields.get(self.field) else {
            return false;
        };
        let value = value.trim();
        let expected = self.equals.trim();
        if value == expected {
            return true;
        }
        match (value.parse::<f64>(), expected.parse::<f64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Conjunction of equality conditions. An empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn matches(&self, fields: &[String]) -> bool {
        self.conditions.iter().all(|c| c.matches(fields))
    }

    pub fn matches_clean(&self, record: &AugmentedRecord) -> bool {
        self.matches(&record.clean_predicate_fields)
    }

    pub fn matches_dirty(&self, record: &AugmentedRecord) -> bool {
        self.matches(&record.dirty_predicate_fields)
    }
}

/// The aggregates the estimators support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Count,
    Sum,
    Avg,
}

impl Aggregate {
    pub const ALL: [Aggregate; 3] = [Aggregate::Count, Aggregate::Sum, Aggregate::Avg];

    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Count => "count",
            Aggregate::Sum => "sum",
            Aggregate::Avg => "avg",
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateSet<T> {
    pub count: T,
    pub sum: T,
    pub avg: T,
}

impl<T: Copy> AggregateSet<T> {
    pub fn get(&self, aggregate: Aggregate) -> T {
        match aggregate {
            Aggregate::Count => self.count,
            Aggregate::Sum => self.sum,
            Aggregate::Avg => self.avg,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Aggregate) -> T) -> Self {
        Self {
            count: f(Aggregate::Count),
            sum: f(Aggregate::Sum),
            avg: f(Aggregate::Avg),
        }
    }
}

/// Externally known constants for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationParameters {
    /// Size of the full dirty population, duplicates included
    pub population_size: u64,
    pub predicate: Predicate,
    /// Exact aggregates over the full dirty population (NormalizedSC only)
    pub all_dirty: Option<AggregateSet<f64>>,
}

/// Point estimate and its sample variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointEstimate {
    pub mean: f64,
    pub variance: f64,
}

/// One row of a result table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    pub sample_size: u32,
    pub mean: f64,
    pub variance: f64,
}

/// Estimation method, also used to name result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    RawSc,
    NormalizedSc,
    RawScAveraged,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::RawSc => "rawsc",
            Method::NormalizedSc => "normalizedsc",
            Method::RawScAveraged => "rawsc_averaged",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Method::RawSc => "RawSC",
            Method::NormalizedSc => "NormalizedSC",
            Method::RawScAveraged => "RawSC (averaged)",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
