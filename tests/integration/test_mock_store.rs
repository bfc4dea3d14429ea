use anyhow::Result;

use colbench_benchmarks::error::{BenchError, StoreError};
use colbench_benchmarks::{generator, workload, DatasetHandle, DatasetStore, Operation, Pipeline, Stage};

use crate::mocks::{MockStore, StoreCall};
use crate::utils::{validate_rows, TestHarness};

#[test]
fn test_pipeline_call_order() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let config = harness.config();
    let store = MockStore::new();

    Pipeline::new(config, &store).run(&Stage::ALL)?;

    let path = config.dataset_path("mock");
    assert_eq!(
        store.calls(),
        vec![
            StoreCall::Remove(path.clone()),
            StoreCall::Create(path.clone()),
            StoreCall::Open(path.clone()),
            StoreCall::Read(vec!["id".to_string(), "name".to_string()]),
            StoreCall::Open(path.clone()),
            StoreCall::Take(config.sample_size as usize),
        ]
    );
    assert_eq!(store.rows_at(&path), Some(config.row_count as usize));

    Ok(())
}

#[test]
fn test_write_replaces_dataset() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let store = MockStore::new();
    let path = harness.root().join("dataset.mock");

    let mut first = generator::stream(50, 8)?;
    workload::write(&store, &path, &mut first)?;
    let mut second = generator::stream(20, 8)?;
    let result = workload::write(&store, &path, &mut second)?;

    assert_eq!(result.cardinality, 20);
    assert_eq!(store.dataset_count(), 1);
    assert_eq!(store.rows_at(&path), Some(20));

    Ok(())
}

#[test]
fn test_open_failure_records_nothing() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let config = harness.config();
    let store = MockStore::failing_open();

    let err = Pipeline::new(config, &store)
        .run(&Stage::ALL)
        .expect_err("open fails");
    match err {
        BenchError::Operation { operation, source } => {
            assert_eq!(operation, Operation::ReadRange);
            assert!(matches!(source, StoreError::Io { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }

    assert!(config.log_path(Operation::Write).exists());
    assert!(!config.log_path(Operation::ReadRange).exists());
    assert!(!config.log_path(Operation::ReadRandom).exists());
    assert!(!config.manifest_path().exists());

    Ok(())
}

#[test]
fn test_take_returns_requested_rows() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let store = MockStore::new();
    let path = harness.root().join("dataset.mock");

    let mut stream = generator::stream(300, 64)?;
    workload::write(&store, &path, &mut stream)?;

    let read = workload::read_random(&store, &path, &["id", "name"], 25, 300, Some(5))?;
    assert_eq!(read.result.cardinality, 25);

    let handle = store.open(&path)?;
    let rows = handle.take(&read.indices, &["id", "name"])?.concat()?;
    validate_rows(&rows, &read.indices)?;

    Ok(())
}
