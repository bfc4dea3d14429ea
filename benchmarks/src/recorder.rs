//! Durable result logs
//!
//! Each (implementation, operation) pair owns one two-line log:
//!
//! ```text
//! <elapsed_ms>
//! <cardinality>
//! ```
//!
//! The file is always replaced atomically so a concurrent reader sees either
//! the previous log or the new one, never a torn write.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::BenchConfig;
use crate::error::{RecordResult, ResultFormatError};
use crate::{BenchmarkResult, Operation};

/// Decoded contents of a result log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResultLog {
    pub elapsed_ms: f64,
    pub cardinality: u64,
}

impl ResultLog {
    /// Decode log text. A trailing newline after line 2 is allowed; anything
    /// else after it is not.
    pub fn parse(text: &str) -> RecordResult<Self> {
        let mut lines = text.lines();

        let elapsed_line = lines
            .next()
            .ok_or(ResultFormatError::MissingLine { line: 1 })?;
        let elapsed_ms = parse_elapsed(elapsed_line)?;

        let cardinality_line = lines
            .next()
            .ok_or(ResultFormatError::MissingLine { line: 2 })?;
        let cardinality = cardinality_line.trim().parse::<u64>().map_err(|_| {
            ResultFormatError::InvalidNumber {
                line: 2,
                value: cardinality_line.to_string(),
            }
        })?;

        if lines.any(|line| !line.trim().is_empty()) {
            return Err(ResultFormatError::TrailingContent);
        }

        Ok(Self {
            elapsed_ms,
            cardinality,
        })
    }
}

fn parse_elapsed(line: &str) -> RecordResult<f64> {
    let invalid = || ResultFormatError::InvalidNumber {
        line: 1,
        value: line.to_string(),
    };

    let value = line.trim().parse::<f64>().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Ok(value)
}

impl fmt::Display for ResultLog {
    // `{}` on f64 is the shortest text that parses back to the same value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.elapsed_ms)?;
        writeln!(f, "{}", self.cardinality)
    }
}

impl From<&BenchmarkResult> for ResultLog {
    fn from(result: &BenchmarkResult) -> Self {
        Self {
            elapsed_ms: result.elapsed_ms,
            cardinality: result.cardinality,
        }
    }
}

/// Write the log for the configured implementation
pub fn record(config: &BenchConfig, result: &BenchmarkResult) -> RecordResult<()> {
    record_for(config, &config.implementation, result)
}

/// Write the log for `implementation`, replacing any previous one.
pub fn record_for(
    config: &BenchConfig,
    implementation: &str,
    result: &BenchmarkResult,
) -> RecordResult<()> {
    let path = config.log_path_for(implementation, result.operation);
    write_log(&path, &ResultLog::from(result))?;
    debug!(
        "Recorded {} for {} at {}",
        result.operation,
        implementation,
        path.display()
    );
    Ok(())
}

/// Atomically replace `path` with the encoded log
pub fn write_log(path: &Path, log: &ResultLog) -> RecordResult<()> {
    atomic_write(path, log.to_string().as_bytes())
}

/// Write `contents` to a temp file beside `path`, fsync it and rename it over
/// `path`.
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> RecordResult<()> {
    let io_error = |source| ResultFormatError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error)?;

    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(contents).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;
    file.persist(path).map_err(|e| io_error(e.error))?;
    Ok(())
}

/// Read and decode the log at `path`
pub fn read_log(path: &Path) -> RecordResult<ResultLog> {
    let text = fs::read_to_string(path).map_err(|source| ResultFormatError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ResultLog::parse(&text)
}

/// Read the log of one (implementation, operation) pair.
///
/// A log that does not exist yet is reported as `Missing`, never waited on.
pub fn load(
    config: &BenchConfig,
    implementation: &str,
    operation: Operation,
) -> RecordResult<ResultLog> {
    let path = config.log_path_for(implementation, operation);
    if !path.is_file() {
        return Err(ResultFormatError::Missing {
            implementation: implementation.to_string(),
            operation,
            path,
        });
    }
    read_log(&path)
}
