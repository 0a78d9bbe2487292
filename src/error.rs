use thiserror::Error;

#[derive(Error, Debug)]
pub enum SampleCleanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Unknown dataset profile: {0}")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, SampleCleanError>;

/// Reasons an estimator produces no result for a sample.
///
/// None of these are fatal: the driver logs them and moves on to the next
/// sample size.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    #[error("sample is empty")]
    EmptySample,

    #[error("no sampled row satisfies the predicate")]
    NoPredicateMatches,

    #[error("none of the {subsets} subsets produced an estimate")]
    NoUsableSubset { subsets: usize },
}
