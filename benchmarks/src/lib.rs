//! ColBench benchmarking harness
//!
//! Measures write, range-read and random-read latency against a columnar
//! dataset file and compares the numbers produced by independent bindings of
//! the same storage engine:
//!
//! - Deterministic synthetic dataset generation
//! - Timed workloads against a pluggable dataset store
//! - Durable two-line result logs, one per implementation and operation
//! - Cross-run aggregation into one comparison chart per operation

pub mod aggregate;
pub mod chart;
pub mod config;
pub mod error;
pub mod generator;
pub mod manifest;
pub mod pipeline;
pub mod recorder;
pub mod store;
pub mod utils;
pub mod workload;

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub use config::BenchConfig;
pub use error::{BenchError, Result};
pub use pipeline::{Pipeline, Stage};
pub use store::{DatasetHandle, DatasetStore, ParquetStore};

/// Operation being benchmarked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Write,
    ReadRange,
    ReadRandom,
}

impl Operation {
    /// Every operation, in pipeline order
    pub const ALL: [Operation; 3] = [Operation::Write, Operation::ReadRange, Operation::ReadRandom];

    /// Stem shared by every binding for this operation's log and chart files.
    pub fn file_stem(&self) -> &'static str {
        match self {
            Operation::Write => "write",
            Operation::ReadRange => "readRange",
            Operation::ReadRandom => "readIndex",
        }
    }

    pub fn log_file_name(&self) -> String {
        format!("{}.log", self.file_stem())
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Write => write!(f, "write"),
            Operation::ReadRange => write!(f, "read_range"),
            Operation::ReadRandom => write!(f, "read_random"),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "write" => Ok(Operation::Write),
            "read_range" | "read-range" | "readRange" => Ok(Operation::ReadRange),
            "read_random" | "read-random" | "readIndex" => Ok(Operation::ReadRandom),
            other => Err(format!("unknown operation '{}'", other)),
        }
    }
}

/// Outcome of one timed operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub operation: Operation,
    /// Wall-clock time of the measured interval in milliseconds
    pub elapsed_ms: f64,
    /// Rows written or read, or the sample size for random reads
    pub cardinality: u64,
}

impl BenchmarkResult {
    pub fn new(operation: Operation, elapsed: Duration, cardinality: u64) -> Self {
        Self {
            operation,
            elapsed_ms: elapsed.as_nanos() as f64 / 1_000_000.0,
            cardinality,
        }
    }
}
