/// Default corruption and sampling constants shared across dataset profiles.

// Corruption probabilities
pub const DEFAULT_VALUE_ERROR_PROB: f64 = 0.30;
pub const DEFAULT_CONDITION_ERROR_PROB: f64 = 0.10;
pub const DEFAULT_DUPLICATION_PROB: f64 = 0.20;

/// Duplication count assigned to a row picked for duplication
pub const DUPLICATED_COPIES: u32 = 2;

// Year corruption used for date-valued fields
pub const DEFAULT_YEAR_TRIGGER_PROB: f64 = 0.30;
pub const DEFAULT_YEAR_PER_DIGIT_PROB: f64 = 0.50;

// Rows with an optional value field that is absent carry this placeholder
// value and a trailing presence flag
pub const MISSING_VALUE: &str = "0";
pub const VALUE_PRESENT: &str = "1";
pub const VALUE_ABSENT: &str = "0";

/// OCR misread table: each digit maps to the characters it can be read as.
/// Every entry includes the digit itself, so a confused value may come out unchanged.
pub const OCR_CONFUSION: [(char, &[char]); 10] = [
    ('0', &['6', '8', '0']),
    ('1', &['7', '1']),
    ('2', &['5', '2']),
    ('3', &['8', '9', '3']),
    ('4', &['9', '4']),
    ('5', &['2', '6', '5']),
    ('6', &['0', '8', '6']),
    ('7', &['1', '7']),
    ('8', &['0', '6', '3', '8']),
    ('9', &['3', '4', '9']),
];

// Target sample sizes: 500..=10000 step 500
pub const SAMPLE_SIZE_START: u32 = 500;
pub const SAMPLE_SIZE_END: u32 = 10_000;
pub const SAMPLE_SIZE_STEP: u32 = 500;

/// 95% two-sided normal quantile
pub const DEFAULT_Z_VALUE: f64 = 1.96;

/// Subsets used by the averaged RawSC variant
pub const DEFAULT_SUBSET_COUNT: usize = 5;

// Built-in dataset profile names (used in CLI)
pub const TPCH_PROFILE: &str = "tpch";
pub const YELLOW_TAXI_PROFILE: &str = "yellow_taxi";
pub const PERSONDATA_PROFILE: &str = "persondata";

// Output file names
pub const ALL_DIRTY_FILE: &str = "dirty_population.tbl";
pub const GENERATION_SUMMARY_FILE: &str = "generation_summary.json";
pub const SAMPLE_FILE_EXTENSION: &str = "tbl";

/// Get all built-in profile names
pub fn get_builtin_profiles() -> Vec<&'static str> {
    vec![TPCH_PROFILE, YELLOW_TAXI_PROFILE, PERSONDATA_PROFILE]
}

/// Default target sample sizes
pub fn default_sample_sizes() -> Vec<u32> {
    (SAMPLE_SIZE_START..=SAMPLE_SIZE_END)
        .step_by(SAMPLE_SIZE_STEP as usize)
        .collect()
}

/// File name of the sample written for target size `size`
pub fn sample_file_name(prefix: &str, size: u32) -> String {
    format!("sample_{}_{}.{}", prefix, size, SAMPLE_FILE_EXTENSION)
}
