//! Error handling for the benchmark harness
//!
//! Errors are grouped by the component that raises them. Configuration errors
//! abort a run before any I/O, store errors abort the operation in flight, and
//! result-format errors only poison one (implementation, operation) pair during
//! aggregation. Nothing in this crate retries.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::Operation;

/// The umbrella error type for a benchmark run
#[derive(Error, Debug)]
pub enum BenchError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dataset generation errors
    #[error("Generator error: {0}")]
    Generator(#[from] GeneratorError),

    /// A store failure, tagged with the operation that was running
    #[error("{operation} failed: {source}")]
    Operation {
        operation: Operation,
        #[source]
        source: StoreError,
    },

    /// Result log errors
    #[error("Result log error: {0}")]
    Record(#[from] ResultFormatError),

    /// I/O errors outside the store
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BenchError {
    /// Attach the running operation to a store failure.
    pub fn operation(operation: Operation) -> impl FnOnce(StoreError) -> Self {
        move |source| BenchError::Operation { operation, source }
    }
}

/// Configuration related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    #[error("Configuration could not be serialized: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value: {field} = {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Dataset generation errors
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("Row count {0} does not fit a signed 64-bit id")]
    RowCountTooLarge(u64),

    #[error("Batch size must be greater than zero")]
    ZeroBatchSize,

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

/// Errors from the dataset store boundary
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Dataset not found: {path}")]
    DatasetNotFound { path: PathBuf },

    #[error("Unknown column '{column}' in dataset {path}")]
    UnknownColumn { column: String, path: PathBuf },

    #[error("Row index {index} out of bounds for dataset with {num_rows} rows")]
    IndexOutOfBounds { index: u64, num_rows: u64 },

    #[error("Sample of {sample_size} rows requested from a dataset of {num_rows} rows")]
    SampleTooLarge { sample_size: u64, num_rows: u64 },

    #[error("Dataset I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| StoreError::Io { path, source }
    }
}

/// Errors reading or writing a result log
#[derive(Error, Debug)]
pub enum ResultFormatError {
    #[error("No {operation} result for implementation '{implementation}' at {path}")]
    Missing {
        implementation: String,
        operation: Operation,
        path: PathBuf,
    },

    #[error("Result log is missing line {line}")]
    MissingLine { line: usize },

    #[error("Result log line {line} is not a valid number: '{value}'")]
    InvalidNumber { line: usize, value: String },

    #[error("Result log has unexpected content after line 2")]
    TrailingContent,

    #[error("Result log I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A single aggregation failure. Aggregation keeps going after one of these
/// and reports all of them at the end.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("{operation} result for '{implementation}' unusable: {source}")]
    Result {
        implementation: String,
        operation: Operation,
        #[source]
        source: ResultFormatError,
    },

    #[error("Run for '{implementation}' used {field} = {recorded}, expected {expected}")]
    ConfigMismatch {
        implementation: String,
        field: &'static str,
        recorded: u64,
        expected: u64,
    },

    #[error("Run for '{implementation}' has no completion manifest at {path}")]
    IncompleteRun { implementation: String, path: PathBuf },

    #[error("Run manifest for '{implementation}' is unreadable: {reason}")]
    Manifest { implementation: String, reason: String },

    #[error("Could not measure dataset size at {path}: {reason}")]
    DatasetSize { path: PathBuf, reason: String },

    #[error("Failed to render {operation} chart to {path}: {reason}")]
    Render {
        operation: Operation,
        path: PathBuf,
        reason: String,
    },

    #[error("Chart output directory {path} unusable: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl AggregateError {
    /// The implementation this failure is about, if any.
    pub fn implementation(&self) -> Option<&str> {
        match self {
            AggregateError::Result { implementation, .. }
            | AggregateError::ConfigMismatch { implementation, .. }
            | AggregateError::IncompleteRun { implementation, .. }
            | AggregateError::Manifest { implementation, .. } => Some(implementation),
            _ => None,
        }
    }
}

/// Result type alias for benchmark runs
pub type Result<T> = std::result::Result<T, BenchError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for generator operations
pub type GeneratorResult<T> = std::result::Result<T, GeneratorError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for result log operations
pub type RecordResult<T> = std::result::Result<T, ResultFormatError>;
