use anyhow::Result;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use sampleclean::app::best_use_case::BestUseCase;
use sampleclean::app::estimation_use_case::EstimationUseCase;
use sampleclean::app::generate_use_case::GenerateUseCase;
use sampleclean::app::ports::ResultInputPort;
use sampleclean::app::truth_use_case::TruthUseCase;
use sampleclean::config::{Config, DatasetProfile};
use sampleclean::constants::{self, ALL_DIRTY_FILE};
use sampleclean::domain::{Aggregate, Method};
use sampleclean::infra::csv_result_store::CsvResultStore;
use sampleclean::infra::sample_directory::DirectorySampleSource;
use sampleclean::pipeline::processing::estimator::{
    AveragedEstimator, CorrectionEstimator, SampleEstimator,
};
use sampleclean::pipeline::processing::parser::RecordParser;

const CONFIG: &str = r#"
[profiles.trips]
file_prefix = "trips"

[profiles.trips.layout]
value_field = 2
predicate_fields = [1]

[profiles.trips.corruption]
predicate_corruption = { kind = "flip", field = 0, when = "1", to = "2", otherwise = "1" }

[profiles.trips.sampling]
sample_sizes = [50, 100]

[profiles.trips.estimation]
predicate = { conditions = [{ field = 0, equals = "1" }] }
"#;

fn write_source(path: &Path, rows: usize) -> Result<()> {
    let mut text = String::new();
    for i in 0..rows {
        let passengers = if i % 3 == 0 { 2 } else { 1 };
        text.push_str(&format!("trip{}|{}|{}.25|N\n", i, passengers, 5 + i % 40));
    }
    fs::write(path, text)?;
    Ok(())
}

fn load_profile(dir: &Path) -> Result<DatasetProfile> {
    let config_path = dir.join("sampleclean.toml");
    fs::write(&config_path, CONFIG)?;
    Ok(Config::load(&config_path)?.resolve_profile("trips")?)
}

/// `dated` persons born in 1950, then `undated` persons split between an
/// empty and a missing birth date field
fn write_persons(path: &Path, dated: usize, undated: usize) -> Result<()> {
    let mut text = String::new();
    for i in 0..dated {
        text.push_str(&format!("person{}|1950-01-01\n", i));
    }
    for i in 0..undated {
        if i % 2 == 0 {
            text.push_str(&format!("nobody{}|\n", i));
        } else {
            text.push_str(&format!("nobody{}\n", i));
        }
    }
    fs::write(path, text)?;
    Ok(())
}

fn estimate(
    profile: &DatasetProfile,
    samples: &Path,
    results: &Path,
    estimator: Box<dyn SampleEstimator>,
) -> Result<()> {
    let parser = RecordParser::for_profile(profile);
    let source = DirectorySampleSource::new(samples, &profile.file_prefix, parser)?;
    let output = Box::new(CsvResultStore::new(results));
    EstimationUseCase::new(estimator, Box::new(source), output).run()?;
    Ok(())
}

#[test]
fn test_generate_truth_estimate_best() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("trips.tbl");
    let generated = temp_dir.path().join("generated");
    let results = temp_dir.path().join("results");
    write_source(&input, 1200)?;

    let profile = load_profile(temp_dir.path())?;
    let stats = GenerateUseCase::new(profile.clone()).run(&input, &generated, Some(42))?;
    assert_eq!(stats.total_lines, 1200);
    assert_eq!(stats.expected_rows, 1200);
    assert_eq!(stats.dirty_population, 1200 + stats.duplicated_rows);

    let summary_path = temp_dir.path().join("truth.json");
    let summary = TruthUseCase::new(profile.clone())
        .run(&generated.join(ALL_DIRTY_FILE), Some(&summary_path))?;
    assert_eq!(summary.population_size, stats.dirty_population);
    let clean = summary.all_clean.expect("clean rows match");
    assert_eq!(clean.count, 800.0);

    let overrides = summary.as_override();
    let params = profile.population_parameters(Some(&overrides))?;
    estimate(&profile, &generated, &results, Box::new(CorrectionEstimator::raw(&params)))?;
    estimate(&profile, &generated, &results, Box::new(CorrectionEstimator::normalized(&params)?))?;
    estimate(&profile, &generated, &results, Box::new(AveragedEstimator::new(&params, 5)))?;

    let store = CsvResultStore::new(&results);
    for method in [Method::RawSc, Method::NormalizedSc, Method::RawScAveraged] {
        for aggregate in Aggregate::ALL {
            assert!(store.results_path(method, aggregate).exists());
        }
    }

    let report = BestUseCase::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        params.population_size,
        1.96,
    )
    .with_clean_truth(summary.all_clean)
    .run()?;
    for aggregate in Aggregate::ALL {
        let choices = &report[&aggregate];
        assert_eq!(choices.len(), 2);
        assert!(choices.iter().all(|c| c.ci.low <= c.mean && c.mean <= c.ci.high));
        assert!(store.best_path(aggregate).exists());
    }
    Ok(())
}

#[test]
fn test_clean_data_makes_normalized_estimate_exact() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("trips.tbl");
    let generated = temp_dir.path().join("generated");
    let results = temp_dir.path().join("results");
    write_source(&input, 600)?;

    let mut profile = load_profile(temp_dir.path())?;
    profile.corruption.value_error_prob = 0.0;
    profile.corruption.condition_error_prob = 0.0;
    profile.corruption.duplication_prob = 0.0;

    GenerateUseCase::new(profile.clone()).run(&input, &generated, Some(3))?;
    let summary = TruthUseCase::new(profile.clone()).run(&generated.join(ALL_DIRTY_FILE), None)?;
    assert_eq!(summary.all_clean, summary.all_dirty);

    let params = profile.population_parameters(Some(&summary.as_override()))?;
    estimate(&profile, &generated, &results, Box::new(CorrectionEstimator::normalized(&params)?))?;

    let store = CsvResultStore::new(&results);
    let dirty = summary.all_dirty.expect("dirty rows match");
    for aggregate in Aggregate::ALL {
        let rows = store.read_results(Method::NormalizedSc, aggregate)?.expect("table written");
        assert_eq!(rows.len(), 2);
        for row in rows {
            let expected = dirty.get(aggregate);
            assert!((row.mean - expected).abs() < 1e-6 * expected.abs().max(1.0));
            assert!(row.variance.abs() < 1e-9);
        }
    }
    Ok(())
}

#[test]
fn test_estimate_with_no_samples_writes_empty_tables() -> Result<()> {
    let temp_dir = tempdir()?;
    let samples = temp_dir.path().join("samples");
    let results = temp_dir.path().join("results");
    fs::create_dir_all(&samples)?;

    let profile = DatasetProfile::tpch();
    let params = profile.population_parameters(None)?;
    estimate(&profile, &samples, &results, Box::new(CorrectionEstimator::raw(&params)))?;

    let text = fs::read_to_string(results.join("rawsc_count_results.csv"))?;
    assert_eq!(text.trim(), "sample_size,mean,variance");
    Ok(())
}

#[test]
fn test_undated_persons_stay_in_population_and_fail_predicate() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("persons.tbl");
    let generated = temp_dir.path().join("generated");
    let results = temp_dir.path().join("results");
    write_persons(&input, 4, 6)?;

    let mut profile = DatasetProfile::persondata();
    profile.corruption.value_error_prob = 0.0;
    profile.corruption.duplication_prob = 0.0;
    profile.sampling.sample_sizes = vec![10];

    let stats = GenerateUseCase::new(profile.clone()).run(&input, &generated, Some(1))?;
    assert_eq!(stats.total_lines, 10);
    assert_eq!(stats.skipped_lines, 0);
    assert_eq!(stats.dirty_population, 10);
    assert_eq!(stats.sample_rows[&10], 10);

    let summary = TruthUseCase::new(profile.clone()).run(&generated.join(ALL_DIRTY_FILE), None)?;
    assert_eq!(summary.population_size, 10);
    let clean = summary.all_clean.expect("dated persons match");
    assert_eq!(clean.count, 4.0);
    assert_eq!(clean.avg, 1950.0);

    let params = profile.population_parameters(Some(&summary.as_override()))?;
    estimate(&profile, &generated, &results, Box::new(CorrectionEstimator::raw(&params)))?;

    let store = CsvResultStore::new(&results);
    let count = store.read_results(Method::RawSc, Aggregate::Count)?.expect("table written");
    assert_eq!(count.len(), 1);
    assert!((count[0].mean - 4.0).abs() < 1e-9);
    let avg = store.read_results(Method::RawSc, Aggregate::Avg)?.expect("table written");
    assert!((avg[0].mean - 1950.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_persondata_generate_truth_estimate_best() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("persons.tbl");
    let generated = temp_dir.path().join("generated");
    let results = temp_dir.path().join("results");
    write_persons(&input, 600, 300)?;

    let mut profile = DatasetProfile::builtin(constants::PERSONDATA_PROFILE)?;
    profile.sampling.sample_sizes = vec![100, 200];

    let stats = GenerateUseCase::new(profile.clone()).run(&input, &generated, Some(7))?;
    assert_eq!(stats.total_lines, 900);
    assert_eq!(stats.expected_rows, 900);
    assert_eq!(stats.skipped_lines, 0);
    assert_eq!(stats.dirty_population, 900 + stats.duplicated_rows);

    let summary = TruthUseCase::new(profile.clone()).run(&generated.join(ALL_DIRTY_FILE), None)?;
    let clean = summary.all_clean.expect("dated persons match");
    assert_eq!(clean.count, 600.0);
    assert_eq!(clean.avg, 1950.0);
    let dirty = summary.all_dirty.expect("dated persons match");
    assert!(dirty.count >= 600.0);

    let params = profile.population_parameters(Some(&summary.as_override()))?;
    estimate(&profile, &generated, &results, Box::new(CorrectionEstimator::raw(&params)))?;
    estimate(&profile, &generated, &results, Box::new(CorrectionEstimator::normalized(&params)?))?;

    let store = CsvResultStore::new(&results);
    for method in [Method::RawSc, Method::NormalizedSc] {
        let rows = store.read_results(method, Aggregate::Count)?.expect("table written");
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.mean.is_finite() && r.variance >= 0.0));
    }

    let report = BestUseCase::new(
        Box::new(store.clone()),
        Box::new(store.clone()),
        params.population_size,
        profile.estimation.z_value,
    )
    .with_clean_truth(summary.all_clean)
    .run()?;
    assert_eq!(report[&Aggregate::Count].len(), 2);
    assert!(store.best_path(Aggregate::Avg).exists());
    Ok(())
}

#[test]
fn test_sample_with_invalid_utf8_line_is_still_estimated() -> Result<()> {
    let temp_dir = tempdir()?;
    let samples = temp_dir.path().join("samples");
    let results = temp_dir.path().join("results");
    fs::create_dir_all(&samples)?;
    fs::write(samples.join("sample_t_500.tbl"), "10|1|10|1|1\n20|2|20|2|1\n")?;
    let mut bad = b"\xff\xfe|1|10|1|1\n".to_vec();
    bad.extend_from_slice(b"30|1|30|1|1\n");
    fs::write(samples.join("sample_t_1000.tbl"), bad)?;

    let mut profile = DatasetProfile::yellow_taxi();
    profile.file_prefix = "t".to_string();
    let params = profile.population_parameters(None)?;
    let source = DirectorySampleSource::new(&samples, "t", RecordParser::for_profile(&profile))?;
    let report = EstimationUseCase::new(
        Box::new(CorrectionEstimator::raw(&params)),
        Box::new(source),
        Box::new(CsvResultStore::new(&results)),
    )
    .run()?;

    assert_eq!(report.malformed_lines, 1);
    assert!(report.skipped.is_empty());
    let sizes: Vec<u32> =
        report.results_for(Aggregate::Count).iter().map(|r| r.sample_size).collect();
    assert_eq!(sizes, vec![500, 1000]);
    assert!(results.join("rawsc_count_results.csv").exists());
    Ok(())
}
