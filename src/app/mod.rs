pub mod ports;
pub mod generate_use_case;
pub mod truth_use_case;
pub mod estimation_use_case;
pub mod best_use_case;
