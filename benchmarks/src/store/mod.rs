//! Dataset store boundary
//!
//! The harness never touches a storage engine directly. Every binding is
//! reached through [`DatasetStore`] (create/open) and [`DatasetHandle`]
//! (read/take), which mirror the dataset API each language exposes.

pub mod parquet_file;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};

use crate::error::{StoreError, StoreResult};

pub use self::parquet_file::ParquetStore;

/// Entry point of a storage binding
pub trait DatasetStore {
    /// Human readable binding name
    fn name(&self) -> &str;

    /// File extension of datasets written by this store
    fn extension(&self) -> &str;

    /// Persist every batch of `reader` as a new dataset at `path` and return
    /// the number of rows written. The dataset must not be observable at
    /// `path` until this returns.
    fn create(&self, path: &Path, reader: &mut dyn RecordBatchReader) -> StoreResult<u64>;

    /// Open an existing dataset
    fn open(&self, path: &Path) -> StoreResult<Box<dyn DatasetHandle>>;

    /// Delete the dataset at `path` if one exists. Returns whether anything
    /// was removed.
    fn remove(&self, path: &Path) -> StoreResult<bool> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(StoreError::io(path)(e)),
        };

        if metadata.is_dir() {
            fs::remove_dir_all(path).map_err(StoreError::io(path))?;
        } else {
            fs::remove_file(path).map_err(StoreError::io(path))?;
        }
        Ok(true)
    }
}

/// An opened dataset
pub trait DatasetHandle {
    fn path(&self) -> &Path;

    fn num_rows(&self) -> u64;

    fn schema(&self) -> SchemaRef;

    /// Materialize every row of the requested columns
    fn read(&self, columns: &[&str]) -> StoreResult<RowSet>;

    /// Fetch the rows at `indices`, in the order given
    fn take(&self, indices: &[u64], columns: &[&str]) -> StoreResult<RowSet>;
}

/// Rows returned by a read
#[derive(Debug, Clone)]
pub struct RowSet {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl RowSet {
    pub fn new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        Self { schema, batches }
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn num_rows(&self) -> u64 {
        self.batches.iter().map(|b| b.num_rows() as u64).sum()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    /// Collapse into a single batch
    pub fn concat(&self) -> Result<RecordBatch, ArrowError> {
        arrow::compute::concat_batches(&self.schema, &self.batches)
    }
}
