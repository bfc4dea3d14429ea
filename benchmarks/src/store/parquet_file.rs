//! Parquet binding of the dataset store
//!
//! A dataset is one Parquet file. Writes go to a sibling `.tmp` file that is
//! renamed into place once the writer is closed and synced, so a reader never
//! sees a half-written dataset.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, UInt64Array};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};
use parquet::arrow::arrow_reader::{ParquetRecordBatchReaderBuilder, RowSelection, RowSelector};
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use tracing::debug;

use super::{DatasetHandle, DatasetStore, RowSet};
use crate::config::StoreSettings;
use crate::error::{StoreError, StoreResult};

/// Rows per batch when decoding
const READ_BATCH_SIZE: usize = 8192;

/// Dataset store writing single-file Parquet datasets
#[derive(Debug, Clone)]
pub struct ParquetStore {
    writer_properties: WriterProperties,
}

impl ParquetStore {
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            writer_properties: Self::create_writer_properties(settings),
        }
    }

    /// Create Parquet writer properties
    fn create_writer_properties(settings: &StoreSettings) -> WriterProperties {
        let compression = match settings.compression.to_uppercase().as_str() {
            "UNCOMPRESSED" => Compression::UNCOMPRESSED,
            "SNAPPY" => Compression::SNAPPY,
            "GZIP" => Compression::GZIP(GzipLevel::default()),
            "LZ4" => Compression::LZ4_RAW,
            "ZSTD" => Compression::ZSTD(ZstdLevel::default()),
            _ => Compression::SNAPPY,
        };

        let mut builder = WriterProperties::builder().set_compression(compression);

        if settings.max_row_group_size > 0 {
            builder = builder.set_max_row_group_size(settings.max_row_group_size);
        }

        builder.build()
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("dataset"));
        name.push(".tmp");
        path.with_file_name(name)
    }

    fn write_file(
        &self,
        temp_path: &Path,
        reader: &mut dyn RecordBatchReader,
    ) -> StoreResult<u64> {
        let file = File::create(temp_path).map_err(StoreError::io(temp_path))?;
        let sync_handle = file.try_clone().map_err(StoreError::io(temp_path))?;

        let mut writer =
            ArrowWriter::try_new(file, reader.schema(), Some(self.writer_properties.clone()))?;

        let mut rows = 0u64;
        for batch in reader {
            let batch = batch?;
            rows += batch.num_rows() as u64;
            writer.write(&batch)?;
        }

        writer.close()?;
        sync_handle.sync_all().map_err(StoreError::io(temp_path))?;
        Ok(rows)
    }
}

impl Default for ParquetStore {
    fn default() -> Self {
        Self::new(&StoreSettings::default())
    }
}

impl DatasetStore for ParquetStore {
    fn name(&self) -> &str {
        "parquet"
    }

    fn extension(&self) -> &str {
        "parquet"
    }

    fn create(&self, path: &Path, reader: &mut dyn RecordBatchReader) -> StoreResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
        }

        let temp_path = Self::temp_path(path);
        let rows = match self.write_file(&temp_path, reader) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };

        fs::rename(&temp_path, path).map_err(StoreError::io(path))?;
        debug!("Wrote {} rows to {}", rows, path.display());
        Ok(rows)
    }

    fn open(&self, path: &Path) -> StoreResult<Box<dyn DatasetHandle>> {
        if !path.is_file() {
            return Err(StoreError::DatasetNotFound {
                path: path.to_path_buf(),
            });
        }

        let file = File::open(path).map_err(StoreError::io(path))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let num_rows = builder.metadata().file_metadata().num_rows().max(0) as u64;
        let schema = builder.schema().clone();

        Ok(Box::new(ParquetHandle {
            path: path.to_path_buf(),
            num_rows,
            schema,
        }))
    }
}

/// An opened Parquet dataset
#[derive(Debug)]
pub struct ParquetHandle {
    path: PathBuf,
    num_rows: u64,
    schema: SchemaRef,
}

impl ParquetHandle {
    fn reader_builder(&self) -> StoreResult<ParquetRecordBatchReaderBuilder<File>> {
        let file = File::open(&self.path).map_err(StoreError::io(&self.path))?;
        Ok(ParquetRecordBatchReaderBuilder::try_new(file)?)
    }

    /// Root column indices for `columns`, in file order
    fn column_indices(&self, columns: &[&str]) -> StoreResult<Vec<usize>> {
        let mut indices = columns
            .iter()
            .map(|column| {
                self.schema
                    .index_of(column)
                    .map_err(|_| StoreError::UnknownColumn {
                        column: column.to_string(),
                        path: self.path.clone(),
                    })
            })
            .collect::<StoreResult<Vec<usize>>>()?;
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    fn projected_schema(&self, indices: &[usize]) -> StoreResult<SchemaRef> {
        Ok(Arc::new(self.schema.project(indices)?))
    }

    /// Selection covering every row of the file that keeps only `sorted`
    fn row_selection(&self, sorted: &[u64]) -> RowSelection {
        let mut selectors = Vec::with_capacity(sorted.len() * 2 + 1);
        let mut cursor = 0u64;

        for &index in sorted {
            if index > cursor {
                selectors.push(RowSelector::skip((index - cursor) as usize));
            }
            selectors.push(RowSelector::select(1));
            cursor = index + 1;
        }

        if cursor < self.num_rows {
            selectors.push(RowSelector::skip((self.num_rows - cursor) as usize));
        }

        RowSelection::from(selectors)
    }
}

impl DatasetHandle for ParquetHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn num_rows(&self) -> u64 {
        self.num_rows
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn read(&self, columns: &[&str]) -> StoreResult<RowSet> {
        let indices = self.column_indices(columns)?;
        let schema = self.projected_schema(&indices)?;

        let builder = self.reader_builder()?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        let reader = builder
            .with_projection(mask)
            .with_batch_size(READ_BATCH_SIZE)
            .build()?;

        let batches = reader.collect::<Result<Vec<RecordBatch>, ArrowError>>()?;
        Ok(RowSet::new(schema, batches))
    }

    fn take(&self, indices: &[u64], columns: &[&str]) -> StoreResult<RowSet> {
        if let Some(&index) = indices.iter().find(|&&i| i >= self.num_rows) {
            return Err(StoreError::IndexOutOfBounds {
                index,
                num_rows: self.num_rows,
            });
        }

        let column_indices = self.column_indices(columns)?;
        let schema = self.projected_schema(&column_indices)?;

        if indices.is_empty() {
            return Ok(RowSet::new(schema, Vec::new()));
        }

        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let builder = self.reader_builder()?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), column_indices);
        let reader = builder
            .with_projection(mask)
            .with_row_selection(self.row_selection(&sorted))
            .with_batch_size(READ_BATCH_SIZE)
            .build()?;

        let batches = reader.collect::<Result<Vec<RecordBatch>, ArrowError>>()?;
        let selected = arrow::compute::concat_batches(&schema, &batches)?;

        // Rows come back in file order; put them back in request order.
        let positions: UInt64Array = indices
            .iter()
            .map(|index| sorted.binary_search(index).unwrap_or_else(|p| p) as u64)
            .collect();

        let columns = selected
            .columns()
            .iter()
            .map(|column| arrow::compute::take(column.as_ref(), &positions, None))
            .collect::<Result<Vec<ArrayRef>, ArrowError>>()?;

        Ok(RowSet::new(
            schema.clone(),
            vec![RecordBatch::try_new(schema, columns)?],
        ))
    }
}
