pub mod csv_result_store;
pub mod in_memory;
pub mod sample_directory;
