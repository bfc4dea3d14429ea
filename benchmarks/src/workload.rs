//! Timed benchmark operations
//!
//! Each function runs exactly one operation against a [`DatasetStore`] and
//! returns one [`BenchmarkResult`]. Store failures are returned tagged with
//! the operation; nothing is retried and nothing is recorded on failure.

use std::path::Path;

use arrow::record_batch::RecordBatchReader;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::error::{BenchError, ConfigError, Result};
use crate::store::DatasetStore;
use crate::utils::Timer;
use crate::{BenchmarkResult, Operation};

/// Outcome of a random read, with the indices that were fetched
#[derive(Debug, Clone)]
pub struct RandomRead {
    pub result: BenchmarkResult,
    pub indices: Vec<u64>,
}

/// Replace the dataset at `path` with the rows of `reader`.
///
/// Removing the old dataset happens before the timer starts; only the
/// store's `create` is measured.
pub fn write(
    store: &dyn DatasetStore,
    path: &Path,
    reader: &mut dyn RecordBatchReader,
) -> Result<BenchmarkResult> {
    let op = Operation::Write;

    if store.remove(path).map_err(BenchError::operation(op))? {
        info!("Removed previous dataset at {}", path.display());
    }

    let timer = Timer::start();
    let rows = store.create(path, reader).map_err(BenchError::operation(op))?;
    let result = BenchmarkResult::new(op, timer.elapsed(), rows);

    info!(
        operation = %op,
        path = %path.display(),
        elapsed_ms = result.elapsed_ms,
        cardinality = result.cardinality,
        "Wrote {} rows",
        rows
    );
    Ok(result)
}

/// Open the dataset and materialize every row of `columns`.
pub fn read_range(
    store: &dyn DatasetStore,
    path: &Path,
    columns: &[&str],
) -> Result<BenchmarkResult> {
    let op = Operation::ReadRange;

    let timer = Timer::start();
    let handle = store.open(path).map_err(BenchError::operation(op))?;
    let rows = handle.read(columns).map_err(BenchError::operation(op))?;
    let result = BenchmarkResult::new(op, timer.elapsed(), rows.num_rows());

    info!(
        operation = %op,
        path = %path.display(),
        elapsed_ms = result.elapsed_ms,
        cardinality = result.cardinality,
        "Read {} rows",
        result.cardinality
    );
    Ok(result)
}

/// Fetch `sample_size` distinct rows chosen uniformly from `[0, row_count)`.
///
/// The measured interval covers opening the dataset, drawing the indices and
/// the lookup. `seed` makes the sample reproducible; `None` draws from OS
/// entropy.
pub fn read_random(
    store: &dyn DatasetStore,
    path: &Path,
    columns: &[&str],
    sample_size: u64,
    row_count: u64,
    seed: Option<u64>,
) -> Result<RandomRead> {
    let op = Operation::ReadRandom;
    check_sample(sample_size, row_count)?;

    let timer = Timer::start();
    let handle = store.open(path).map_err(BenchError::operation(op))?;
    let indices = sample_indices(row_count, sample_size, seed)?;
    let rows = handle
        .take(&indices, columns)
        .map_err(BenchError::operation(op))?;
    let elapsed = timer.elapsed();

    let result = BenchmarkResult::new(op, elapsed, sample_size);
    info!(
        operation = %op,
        path = %path.display(),
        elapsed_ms = result.elapsed_ms,
        cardinality = result.cardinality,
        "Took {} random rows out of {}",
        rows.num_rows(),
        row_count
    );

    Ok(RandomRead { result, indices })
}

fn check_sample(sample_size: u64, row_count: u64) -> Result<()> {
    if row_count == 0 {
        return Err(ConfigError::InvalidValue {
            field: "row_count".to_string(),
            value: row_count.to_string(),
        }
        .into());
    }

    if sample_size > row_count {
        return Err(ConfigError::ValidationFailed {
            reason: format!(
                "sample_size {} exceeds row_count {}",
                sample_size, row_count
            ),
        }
        .into());
    }

    Ok(())
}

/// Draw `sample_size` distinct indices in `[0, row_count)` without
/// replacement, in draw order.
pub fn sample_indices(row_count: u64, sample_size: u64, seed: Option<u64>) -> Result<Vec<u64>> {
    check_sample(sample_size, row_count)?;

    let length = usize::try_from(row_count).map_err(|_| ConfigError::InvalidValue {
        field: "row_count".to_string(),
        value: row_count.to_string(),
    })?;
    // Bounded by row_count above.
    let amount = sample_size as usize;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    Ok(rand::seq::index::sample(&mut rng, length, amount)
        .into_iter()
        .map(|i| i as u64)
        .collect())
}
