//! ColBench Benchmark Runner
//!
//! Runs the write / range-read / random-read pipeline for one implementation
//! and aggregates the logs of every implementation into comparison charts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colbench_benchmarks::aggregate::{self, AggregateReport};
use colbench_benchmarks::chart::PlottersRenderer;
use colbench_benchmarks::pipeline::RunReport;
use colbench_benchmarks::{BenchConfig, Operation, ParquetStore, Pipeline, Stage};
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "benchmark-runner")]
#[command(about = "Columnar file format benchmark runner")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path; defaults are used if it does not exist
    #[arg(short, long, global = true, default_value = "bench_config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    /// Output format for run results (text, json, csv)
    #[arg(short, long, global = true, default_value = "text")]
    output: String,

    /// Output file
    #[arg(short, long, global = true)]
    file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark pipeline for the configured implementation
    Run {
        /// Stages to run, in order
        #[arg(long, value_delimiter = ',', default_value = "write,read-range,read-random")]
        stages: Vec<Stage>,

        /// Seed for random-read sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Implementation id to record results under
        #[arg(long)]
        implementation: Option<String>,
    },
    /// Render comparison charts from recorded logs
    Aggregate {
        /// Implementations to compare, in chart order
        #[arg(long, value_delimiter = ',')]
        implementations: Option<Vec<String>>,

        /// Directory for chart images
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Validate benchmark configuration
    Validate,
    /// Generate sample configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    match &cli.command {
        Commands::Run {
            stages,
            seed,
            implementation,
        } => run_command(&cli, stages, *seed, implementation.clone()),
        Commands::Aggregate {
            implementations,
            output_dir,
        } => aggregate_command(&cli, implementations.clone(), output_dir.clone()),
        Commands::Validate => validate_config_command(&cli),
        Commands::Config => generate_config_command(&cli),
    }
}

/// Initialize logging
fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("colbench_benchmarks={}", log_level).parse()?)
        .add_directive(format!("benchmark_runner={}", log_level).parse()?);

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

/// File settings, then environment overrides
fn load_config(path: &Path) -> Result<BenchConfig> {
    if path.exists() {
        info!("Loading configuration from {}", path.display());
    } else {
        info!("No configuration at {}, using defaults", path.display());
    }

    BenchConfig::resolve(path, |key| std::env::var(key).ok())
        .with_context(|| format!("failed to load {}", path.display()))
}

fn run_command(
    cli: &Cli,
    stages: &[Stage],
    seed: Option<u64>,
    implementation: Option<String>,
) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    if seed.is_some() {
        config.seed = seed;
    }
    if let Some(implementation) = implementation {
        config.implementation = implementation;
    }
    if config.seed.is_none() && stages.contains(&Stage::ReadRandom) {
        warn!("No seed configured; the random-read sample will not be reproducible");
    }

    let store = ParquetStore::new(&config.store);
    let report = Pipeline::new(&config, &store).run(stages)?;
    report.log_summary();

    output_results(&report, &cli.output, cli.file.as_deref())?;
    Ok(())
}

fn aggregate_command(
    cli: &Cli,
    implementations: Option<Vec<String>>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = load_config(&cli.config)?;
    if let Some(implementations) = implementations {
        config.aggregate.implementations = implementations;
        if !config
            .aggregate
            .implementations
            .contains(&config.aggregate.reference_implementation)
        {
            if let Some(first) = config.aggregate.implementations.first() {
                config.aggregate.reference_implementation = first.clone();
            }
        }
    }
    if let Some(output_dir) = output_dir {
        config.aggregate.output_dir = output_dir;
    }
    config.validate_aggregate()?;

    info!(
        "Aggregating {} implementation(s) from {}",
        config.aggregate.implementations.len(),
        config.base_dir.display()
    );

    let report = aggregate::aggregate(
        &config,
        &config.aggregate.implementations,
        &Operation::ALL,
        &PlottersRenderer,
    );
    summarize_aggregate(&report)
}

fn summarize_aggregate(report: &AggregateReport) -> Result<()> {
    info!("Rendered {} chart(s)", report.charts.len());

    if !report.is_success() {
        for failure in &report.failures {
            warn!("Aggregation failure: {}", failure);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn validate_config_command(cli: &Cli) -> Result<()> {
    info!("Validating configuration: {}", cli.config.display());

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            warn!("Configuration is invalid: {:#}", e);
            return Err(e);
        }
    };

    config.validate()?;
    config.validate_aggregate()?;
    info!("Configuration is valid");

    Ok(())
}

fn generate_config_command(cli: &Cli) -> Result<()> {
    let config = BenchConfig::default();

    config.save_to_file(&cli.config)?;
    info!("Generated sample configuration: {}", cli.config.display());

    Ok(())
}

fn output_results(report: &RunReport, format: &str, output_file: Option<&Path>) -> Result<()> {
    let output = match format {
        "text" => return Ok(()),
        "json" => serde_json::to_string_pretty(report)?,
        "csv" => results_to_csv(report),
        _ => return Err(anyhow::anyhow!("Unsupported output format: {}", format)),
    };

    if let Some(file_path) = output_file {
        std::fs::write(file_path, output)?;
        info!("Results written to: {}", file_path.display());
    } else {
        println!("{}", output);
    }

    Ok(())
}

fn results_to_csv(report: &RunReport) -> String {
    let mut csv = String::new();
    csv.push_str("implementation,operation,elapsed_ms,cardinality\n");

    for result in &report.results {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            report.implementation, result.operation, result.elapsed_ms, result.cardinality,
        ));
    }

    csv
}
