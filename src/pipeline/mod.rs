// Data pipeline: dirty-data generation, then sample processing and estimation

pub mod generation;
pub mod lines;
pub mod processing;

// Re-export key types from each stage
pub use generation::DirtyDataGenerator;
pub use processing::parser;
