//! Explicit benchmark pipeline
//!
//! `Pipeline::run` executes the requested stages strictly in order on the
//! calling thread. Each successful stage records its result before the next
//! stage starts; the first failure ends the run and leaves no completion
//! manifest behind.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BenchConfig;
use crate::error::Result;
use crate::generator;
use crate::manifest::RunManifest;
use crate::recorder;
use crate::store::DatasetStore;
use crate::utils::format::{duration_human, millis_human, rate_human};
use crate::utils::Timer;
use crate::workload;
use crate::{BenchmarkResult, Operation};

/// One step of a benchmark run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    /// Generate the dataset and write it through the store
    Write,
    ReadRange,
    ReadRandom,
}

impl Stage {
    /// The default run, in order
    pub const ALL: [Stage; 3] = [Stage::Write, Stage::ReadRange, Stage::ReadRandom];

    pub fn operation(&self) -> Operation {
        match self {
            Stage::Write => Operation::Write,
            Stage::ReadRange => Operation::ReadRange,
            Stage::ReadRandom => Operation::ReadRandom,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Write => write!(f, "write"),
            Stage::ReadRange => write!(f, "read-range"),
            Stage::ReadRandom => write!(f, "read-random"),
        }
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let operation = s
            .parse::<Operation>()
            .map_err(|_| format!("unknown stage '{}' (expected write, read-range, read-random)", s))?;
        Ok(match operation {
            Operation::Write => Stage::Write,
            Operation::ReadRange => Stage::ReadRange,
            Operation::ReadRandom => Stage::ReadRandom,
        })
    }
}

/// Results of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub implementation: String,
    pub started_at: DateTime<Utc>,
    pub results: Vec<BenchmarkResult>,
    /// Row indices fetched by the random read, if it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled_indices: Option<Vec<u64>>,
    #[serde(skip)]
    pub total: Duration,
}

impl RunReport {
    pub fn result(&self, operation: Operation) -> Option<&BenchmarkResult> {
        self.results.iter().find(|r| r.operation == operation)
    }

    /// Log a human readable summary of every stage
    pub fn log_summary(&self) {
        info!(
            "Run for '{}' finished in {}",
            self.implementation,
            duration_human(self.total)
        );
        for result in &self.results {
            let rate = if result.elapsed_ms > 0.0 {
                result.cardinality as f64 / (result.elapsed_ms / 1000.0)
            } else {
                0.0
            };
            info!(
                "  {:<12} {:>10}  {:>12} rows  {}",
                result.operation.to_string(),
                millis_human(result.elapsed_ms),
                result.cardinality,
                rate_human(rate, "rows")
            );
        }
    }
}

/// A configured benchmark run against one store
pub struct Pipeline<'a> {
    config: &'a BenchConfig,
    store: &'a dyn DatasetStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a BenchConfig, store: &'a dyn DatasetStore) -> Self {
        Self { config, store }
    }

    /// Run `stages` in the order given.
    pub fn run(&self, stages: &[Stage]) -> Result<RunReport> {
        self.config.validate()?;

        let started_at = Utc::now();
        let timer = Timer::start();

        let manifest_path = self.config.manifest_path();
        if RunManifest::remove(&manifest_path)? {
            info!("Removed stale run manifest {}", manifest_path.display());
        }

        info!(
            "Starting run for '{}' with {} stage(s) on {} store",
            self.config.implementation,
            stages.len(),
            self.store.name()
        );

        let mut results = Vec::with_capacity(stages.len());
        let mut sampled_indices = None;

        for &stage in stages {
            let result = match self.run_stage(stage) {
                Ok((result, indices)) => {
                    if indices.is_some() {
                        sampled_indices = indices;
                    }
                    result
                }
                Err(e) => {
                    warn!("Stage {} failed: {}", stage, e);
                    return Err(e);
                }
            };

            recorder::record(self.config, &result)?;
            results.push(result);
        }

        let operations = stages.iter().map(Stage::operation).collect();
        RunManifest::completed(self.config, operations, started_at)?.write(&manifest_path)?;

        Ok(RunReport {
            implementation: self.config.implementation.clone(),
            started_at,
            results,
            sampled_indices,
            total: timer.elapsed(),
        })
    }

    fn run_stage(&self, stage: Stage) -> Result<(BenchmarkResult, Option<Vec<u64>>)> {
        let config = self.config;
        let path = config.dataset_path(self.store.extension());
        let columns = config.column_refs();

        match stage {
            Stage::Write => {
                let mut stream = generator::stream(config.row_count, config.batch_size)?;
                Ok((workload::write(self.store, &path, &mut stream)?, None))
            }
            Stage::ReadRange => Ok((workload::read_range(self.store, &path, &columns)?, None)),
            Stage::ReadRandom => {
                let read = workload::read_random(
                    self.store,
                    &path,
                    &columns,
                    config.sample_size,
                    config.row_count,
                    config.seed,
                )?;
                Ok((read.result, Some(read.indices)))
            }
        }
    }
}
