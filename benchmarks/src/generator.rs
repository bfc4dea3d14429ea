//! Deterministic synthetic dataset generation
//!
//! Row `i` always carries `id = i` and `name = "test{i}"`. Nothing here is
//! random, so every binding writes byte-for-byte the same logical data.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringBuilder};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};

use crate::error::{GeneratorError, GeneratorResult};

/// Integer column name
pub const ID_COLUMN: &str = "id";
/// String column name
pub const NAME_COLUMN: &str = "name";

/// Arrow schema of the benchmark dataset
pub fn dataset_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Int64, false),
        Field::new(NAME_COLUMN, DataType::Utf8, false),
    ]))
}

/// Textual encoding of a row id
pub fn name_for(id: i64) -> String {
    format!("test{}", id)
}

/// Build the whole dataset as one batch.
///
/// Fine for test-sized counts; for tens of millions of rows use [`stream`]
/// so peak memory stays bounded by one chunk.
pub fn generate(row_count: u64) -> GeneratorResult<RecordBatch> {
    check_row_count(row_count)?;
    Ok(build_chunk(&dataset_schema(), 0, row_count)?)
}

/// Stream the dataset in chunks of at most `batch_size` rows.
pub fn stream(row_count: u64, batch_size: usize) -> GeneratorResult<SyntheticStream> {
    check_row_count(row_count)?;
    if batch_size == 0 {
        return Err(GeneratorError::ZeroBatchSize);
    }

    Ok(SyntheticStream {
        schema: dataset_schema(),
        row_count,
        batch_size: batch_size as u64,
        next_id: 0,
    })
}

fn check_row_count(row_count: u64) -> GeneratorResult<()> {
    if row_count > i64::MAX as u64 {
        return Err(GeneratorError::RowCountTooLarge(row_count));
    }
    Ok(())
}

fn build_chunk(schema: &SchemaRef, start: u64, end: u64) -> Result<RecordBatch, ArrowError> {
    let start = start as i64;
    let end = end as i64;
    let len = (end - start) as usize;

    let ids = Int64Array::from_iter_values(start..end);

    // "test" plus up to 19 digits
    let mut names = StringBuilder::with_capacity(len, len * 12);
    for id in start..end {
        names.append_value(name_for(id));
    }

    let columns: Vec<ArrayRef> = vec![Arc::new(ids), Arc::new(names.finish())];
    RecordBatch::try_new(schema.clone(), columns)
}

/// Chunked producer of the synthetic dataset
///
/// Concatenating every batch yields exactly what [`generate`] returns.
#[derive(Debug)]
pub struct SyntheticStream {
    schema: SchemaRef,
    row_count: u64,
    batch_size: u64,
    next_id: u64,
}

impl SyntheticStream {
    /// Rows not yet handed out
    pub fn remaining(&self) -> u64 {
        self.row_count - self.next_id
    }
}

impl Iterator for SyntheticStream {
    type Item = Result<RecordBatch, ArrowError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_id >= self.row_count {
            return None;
        }

        let start = self.next_id;
        let end = (start + self.batch_size).min(self.row_count);
        self.next_id = end;

        Some(build_chunk(&self.schema, start, end))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let chunks = self.remaining().div_ceil(self.batch_size) as usize;
        (chunks, Some(chunks))
    }
}

impl RecordBatchReader for SyntheticStream {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
