use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use sampleclean::app::best_use_case::BestUseCase;
use sampleclean::app::estimation_use_case::EstimationUseCase;
use sampleclean::app::generate_use_case::GenerateUseCase;
use sampleclean::app::truth_use_case::TruthUseCase;
use sampleclean::config::{Config, DatasetProfile};
use sampleclean::constants;
use sampleclean::domain::Aggregate;
use sampleclean::infra::csv_result_store::CsvResultStore;
use sampleclean::infra::sample_directory::DirectorySampleSource;
use sampleclean::logging::init_logging;
use sampleclean::metrics;
use sampleclean::pipeline::processing::estimator::{
    AveragedEstimator, CorrectionEstimator, SampleEstimator,
};
use sampleclean::pipeline::processing::parser::RecordParser;
use sampleclean::pipeline::processing::truth::PopulationSummary;

#[derive(Parser)]
#[command(name = "sampleclean")]
#[command(about = "Dirty-data generation and sample-based cleaning estimators")]
#[command(version = "0.1.0")]
struct Cli {
    /// TOML file with additional dataset profiles
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset profile, built-in or from --config
    #[arg(long, global = true, default_value = constants::TPCH_PROFILE)]
    profile: String,

    /// Write a Prometheus text snapshot of run metrics to this file
    #[arg(long, global = true)]
    metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Corrupt a clean source table and draw the weighted samples
    Generate {
        /// Pipe-delimited clean source file
        #[arg(long)]
        input: PathBuf,
        /// Directory for the dirty population, samples and generation summary
        #[arg(long)]
        output_dir: PathBuf,
        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Compute exact clean and dirty aggregates over a generated population
    Truth {
        /// Dirty population file written by `generate`
        #[arg(long)]
        input: PathBuf,
        /// Where to write the population summary JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run one estimator over every sample in a directory
    Estimate {
        /// Directory holding the sample files
        #[arg(long)]
        samples: PathBuf,
        #[arg(long, value_enum)]
        method: MethodArg,
        /// Directory for the result tables
        #[arg(long)]
        results: PathBuf,
        /// Population summary overriding the profile's N and dirty aggregates
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Subset count for the averaged estimator
        #[arg(long)]
        subsets: Option<usize>,
    },
    /// Pick the estimator with the narrowest confidence interval per sample size
    Best {
        /// Directory holding the RawSC and NormalizedSC result tables
        #[arg(long)]
        results: PathBuf,
        /// Population summary overriding the profile's N and clean aggregates
        #[arg(long)]
        summary: Option<PathBuf>,
        /// Critical value for the confidence interval
        #[arg(long)]
        z: Option<f64>,
    },
    /// List the available dataset profiles
    Profiles,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Rawsc,
    Normalizedsc,
    RawscAveraged,
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(Config::default()),
    }
}

fn load_summary(path: Option<&Path>) -> Result<Option<PopulationSummary>> {
    path.map(|p| {
        PopulationSummary::load(p)
            .with_context(|| format!("Failed to load population summary {}", p.display()))
    })
    .transpose()
}

fn build_estimator(
    method: MethodArg,
    profile: &DatasetProfile,
    summary: Option<&PopulationSummary>,
    subsets: Option<usize>,
) -> Result<Box<dyn SampleEstimator>> {
    let overrides = summary.map(PopulationSummary::as_override);
    let params = profile.population_parameters(overrides.as_ref())?;

    Ok(match method {
        MethodArg::Rawsc => Box::new(CorrectionEstimator::raw(&params)),
        MethodArg::Normalizedsc => Box::new(CorrectionEstimator::normalized(&params)?),
        MethodArg::RawscAveraged => Box::new(AveragedEstimator::new(
            &params,
            subsets.unwrap_or(profile.estimation.subset_count),
        )),
    })
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Profiles => {
            println!("📋 Built-in profiles:");
            for name in constants::get_builtin_profiles() {
                println!("   - {}", name);
            }
            if !config.profiles.is_empty() {
                println!("📋 Profiles from config:");
                for name in config.profiles.keys() {
                    println!("   - {}", name);
                }
            }
        }
        Commands::Generate {
            input,
            output_dir,
            seed,
        } => {
            let profile = config.resolve_profile(&cli.profile)?;
            println!("🔄 Generating dirty data for profile '{}'...", profile.name);
            let stats = GenerateUseCase::new(profile).run(&input, &output_dir, seed)?;

            println!("\n📊 Generation Results:");
            println!("   Source rows: {}", stats.total_lines);
            println!("   Skipped rows: {}", stats.skipped_lines);
            println!("   Corrupted rows: {}", stats.value_changes);
            println!("   Duplicated rows: {}", stats.duplicated_rows);
            println!("   Dirty population: {}", stats.dirty_population);
            for (size, rows) in &stats.sample_rows {
                println!("   Sample {}: {} rows", size, rows);
            }
        }
        Commands::Truth { input, output } => {
            let profile = config.resolve_profile(&cli.profile)?;
            let summary = TruthUseCase::new(profile).run(&input, output.as_deref())?;

            println!("\n📊 Population Summary:");
            println!("   Rows: {}", summary.rows);
            println!("   Dirty population size: {}", summary.population_size);
            for (label, set) in [("clean", summary.all_clean), ("dirty", summary.all_dirty)] {
                match set {
                    Some(set) => {
                        for aggregate in Aggregate::ALL {
                            println!("   {} {}: {}", label, aggregate, set.get(aggregate));
                        }
                    }
                    None => println!("   {}: no row matches the predicate", label),
                }
            }
        }
        Commands::Estimate {
            samples,
            method,
            results,
            summary,
            subsets,
        } => {
            let profile = config.resolve_profile(&cli.profile)?;
            let summary = load_summary(summary.as_deref())?;
            let estimator = build_estimator(method, &profile, summary.as_ref(), subsets)?;
            println!("🔨 Running {}...", estimator.method().label());

            let parser = RecordParser::for_profile(&profile);
            let source = DirectorySampleSource::new(samples, &profile.file_prefix, parser)?;
            let output = Box::new(CsvResultStore::new(&results));
            let use_case = EstimationUseCase::new(estimator, Box::new(source), output);
            let report = use_case.run()?;

            println!("\n📊 {} Results:", report.method.label());
            for result in report.results_for(Aggregate::Count) {
                println!("   Sample {}: estimated", result.sample_size);
            }
            if !report.skipped.is_empty() {
                println!("\n⚠️  Skipped samples:");
                for skipped in &report.skipped {
                    println!("   - {}: {}", skipped.sample_size, skipped.reason);
                }
            }
            println!("   Output directory: {}", results.display());
        }
        Commands::Best { results, summary, z } => {
            let profile = config.resolve_profile(&cli.profile)?;
            let summary = load_summary(summary.as_deref())?;
            let overrides = summary.as_ref().map(PopulationSummary::as_override);
            let params = profile.population_parameters(overrides.as_ref())?;
            let z = z.unwrap_or(profile.estimation.z_value);

            let store = CsvResultStore::new(&results);
            let n = params.population_size;
            let report = BestUseCase::new(Box::new(store.clone()), Box::new(store), n, z)
                .with_clean_truth(profile.all_clean(overrides.as_ref()))
                .run()?;

            for (aggregate, choices) in &report {
                println!("\n📊 Best estimator for {}:", aggregate);
                for choice in choices {
                    println!(
                        "   {}: {} mean={:.4} ci=[{:.4}, {:.4}]",
                        choice.sample_size,
                        choice.method.label(),
                        choice.mean,
                        choice.ci.low,
                        choice.ci.high
                    );
                }
            }
        }
    }

    Ok(())
}

fn write_metrics(path: &Path) -> Result<()> {
    if let Some(text) = metrics::render() {
        fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!("Metrics snapshot written to {}", path.display());
    }
    Ok(())
}

fn main() {
    let guard = init_logging();
    let cli = Cli::parse();

    let metrics_out = cli.metrics_out.clone();
    if metrics_out.is_some() {
        metrics::init_metrics();
    }

    let outcome = run(cli).and_then(|()| match metrics_out.as_deref() {
        Some(path) => write_metrics(path),
        None => Ok(()),
    });

    match outcome {
        Ok(()) => info!("Done"),
        Err(e) => {
            error!("Run failed: {:#}", e);
            println!("❌ Run failed: {:#}", e);
            drop(guard);
            std::process::exit(1);
        }
    }
}
