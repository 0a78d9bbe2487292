// Sample processing: record parsing, estimation, ground truth and selection

pub mod estimator;
pub mod parser;
pub mod selection;
pub mod truth;
