use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use arrow::array::{ArrayRef, UInt64Array};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::{RecordBatch, RecordBatchReader};

use colbench_benchmarks::error::{StoreError, StoreResult};
use colbench_benchmarks::store::{DatasetHandle, DatasetStore, RowSet};

/// A call made against the mock store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Remove(PathBuf),
    Create(PathBuf),
    Open(PathBuf),
    Read(Vec<String>),
    Take(usize),
}

#[derive(Default)]
struct MockState {
    datasets: HashMap<PathBuf, Arc<RecordBatch>>,
    calls: Vec<StoreCall>,
}

/// Dataset store that keeps every dataset in memory and logs each call
#[derive(Default)]
pub struct MockStore {
    state: Arc<Mutex<MockState>>,
    fail_open: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `open` always fails with an I/O error
    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        lock(&self.state)
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state().calls.clone()
    }

    pub fn dataset_count(&self) -> usize {
        self.state().datasets.len()
    }

    pub fn rows_at(&self, path: &Path) -> Option<usize> {
        self.state().datasets.get(path).map(|b| b.num_rows())
    }
}

impl DatasetStore for MockStore {
    fn name(&self) -> &str {
        "mock"
    }

    fn extension(&self) -> &str {
        "mock"
    }

    fn create(&self, path: &Path, reader: &mut dyn RecordBatchReader) -> StoreResult<u64> {
        let schema = reader.schema();
        let batches = reader.collect::<Result<Vec<RecordBatch>, ArrowError>>()?;
        let batch = arrow::compute::concat_batches(&schema, &batches)?;
        let rows = batch.num_rows() as u64;

        let mut state = self.state();
        state.calls.push(StoreCall::Create(path.to_path_buf()));
        state.datasets.insert(path.to_path_buf(), Arc::new(batch));
        Ok(rows)
    }

    fn open(&self, path: &Path) -> StoreResult<Box<dyn DatasetHandle>> {
        let mut state = self.state();
        state.calls.push(StoreCall::Open(path.to_path_buf()));

        if self.fail_open {
            return Err(StoreError::io(path)(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "mock open failure",
            )));
        }

        let batch = state
            .datasets
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::DatasetNotFound {
                path: path.to_path_buf(),
            })?;
        drop(state);

        Ok(Box::new(MockHandle {
            state: self.state.clone(),
            path: path.to_path_buf(),
            batch,
        }))
    }

    fn remove(&self, path: &Path) -> StoreResult<bool> {
        let mut state = self.state();
        state.calls.push(StoreCall::Remove(path.to_path_buf()));
        Ok(state.datasets.remove(path).is_some())
    }
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct MockHandle {
    state: Arc<Mutex<MockState>>,
    path: PathBuf,
    batch: Arc<RecordBatch>,
}

impl MockHandle {
    fn log(&self, call: StoreCall) {
        lock(&self.state).calls.push(call);
    }

    fn project(&self, columns: &[&str]) -> StoreResult<(SchemaRef, Vec<usize>)> {
        let schema = self.batch.schema();
        let indices = columns
            .iter()
            .map(|column| {
                schema.index_of(column).map_err(|_| StoreError::UnknownColumn {
                    column: column.to_string(),
                    path: self.path.clone(),
                })
            })
            .collect::<StoreResult<Vec<usize>>>()?;
        Ok((Arc::new(schema.project(&indices)?), indices))
    }
}

impl DatasetHandle for MockHandle {
    fn path(&self) -> &Path {
        &self.path
    }

    fn num_rows(&self) -> u64 {
        self.batch.num_rows() as u64
    }

    fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    fn read(&self, columns: &[&str]) -> StoreResult<RowSet> {
        self.log(StoreCall::Read(columns.iter().map(|c| c.to_string()).collect()));
        let (schema, indices) = self.project(columns)?;
        let batch = self.batch.project(&indices)?;
        Ok(RowSet::new(schema, vec![batch]))
    }

    fn take(&self, indices: &[u64], columns: &[&str]) -> StoreResult<RowSet> {
        self.log(StoreCall::Take(indices.len()));
        if let Some(&index) = indices.iter().find(|&&i| i >= self.num_rows()) {
            return Err(StoreError::IndexOutOfBounds {
                index,
                num_rows: self.num_rows(),
            });
        }

        let (schema, column_indices) = self.project(columns)?;
        let positions = UInt64Array::from(indices.to_vec());
        let columns = column_indices
            .iter()
            .map(|&i| arrow::compute::take(self.batch.column(i).as_ref(), &positions, None))
            .collect::<Result<Vec<ArrayRef>, ArrowError>>()?;
        let batch = RecordBatch::try_new(schema.clone(), columns)?;
        Ok(RowSet::new(schema, vec![batch]))
    }
}
