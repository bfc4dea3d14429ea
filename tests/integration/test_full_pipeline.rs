use std::collections::HashSet;

use anyhow::Result;

use colbench_benchmarks::aggregate;
use colbench_benchmarks::chart::PlottersRenderer;
use colbench_benchmarks::manifest::RunManifest;
use colbench_benchmarks::recorder;
use colbench_benchmarks::{DatasetHandle, DatasetStore, Operation, ParquetStore, Pipeline, Stage};

use crate::utils::{validate_rows, TestHarness};
use crate::{TEST_ROW_COUNT, TEST_SAMPLE_SIZE};

/// Full pipeline integration test
/// generate → write → read_range → read_random → logs → manifest
#[test]
fn test_end_to_end_run() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let config = harness.config();
    let store = ParquetStore::new(&config.store);

    let report = Pipeline::new(config, &store).run(&Stage::ALL)?;

    let expected = [
        (Operation::Write, TEST_ROW_COUNT),
        (Operation::ReadRange, TEST_ROW_COUNT),
        (Operation::ReadRandom, TEST_SAMPLE_SIZE),
    ];
    for (operation, cardinality) in expected {
        let result = report.result(operation).expect("result for every stage");
        assert_eq!(result.cardinality, cardinality);
        assert!(result.elapsed_ms >= 0.0);

        let log = recorder::load(config, "rust", operation)?;
        assert_eq!(log.cardinality, cardinality);
        assert_eq!(log.elapsed_ms, result.elapsed_ms);
    }

    let indices = report.sampled_indices.clone().expect("random read ran");
    assert_eq!(indices.len() as u64, TEST_SAMPLE_SIZE);
    let distinct: HashSet<u64> = indices.iter().copied().collect();
    assert_eq!(distinct.len(), indices.len());
    assert!(indices.iter().all(|&i| i < TEST_ROW_COUNT));

    // The sampled rows are the synthetic rows at those positions.
    let handle = store.open(&config.dataset_path(store.extension()))?;
    let rows = handle.take(&indices, &config.column_refs())?.concat()?;
    validate_rows(&rows, &indices)?;

    let manifest = RunManifest::read(&config.manifest_path())?.expect("manifest written");
    assert_eq!(manifest.implementation, "rust");
    assert_eq!(manifest.row_count, TEST_ROW_COUNT);
    assert_eq!(manifest.sample_size, TEST_SAMPLE_SIZE);
    assert_eq!(manifest.stages, Operation::ALL.to_vec());

    Ok(())
}

#[test]
fn test_dataset_contents_after_write() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::with_rows(777, 7)?;
    let config = harness.config();
    let store = ParquetStore::new(&config.store);

    Pipeline::new(config, &store).run(&[Stage::Write])?;

    let handle = store.open(&config.dataset_path(store.extension()))?;
    assert_eq!(handle.num_rows(), 777);
    let rows = handle.read(&["id", "name"])?.concat()?;
    let expected: Vec<u64> = (0..777).collect();
    validate_rows(&rows, &expected)?;

    Ok(())
}

#[test]
fn test_write_twice_yields_row_count_both_times() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let config = harness.config();
    let store = ParquetStore::new(&config.store);
    let pipeline = Pipeline::new(config, &store);

    for _ in 0..2 {
        let report = pipeline.run(&[Stage::Write, Stage::ReadRange])?;
        assert_eq!(
            report.result(Operation::Write).map(|r| r.cardinality),
            Some(TEST_ROW_COUNT)
        );
        assert_eq!(
            report.result(Operation::ReadRange).map(|r| r.cardinality),
            Some(TEST_ROW_COUNT)
        );
    }

    let leftovers: Vec<_> = std::fs::read_dir(config.implementation_dir())?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    Ok(())
}

#[test]
fn test_seeded_runs_sample_the_same_rows() -> Result<()> {
    crate::test_setup!();
    let harness = TestHarness::new()?;
    let config = harness.config();
    let store = ParquetStore::new(&config.store);
    let pipeline = Pipeline::new(config, &store);

    pipeline.run(&[Stage::Write])?;
    let first = pipeline.run(&[Stage::ReadRandom])?.sampled_indices;
    let second = pipeline.run(&[Stage::ReadRandom])?.sampled_indices;
    assert!(first.is_some());
    assert_eq!(first, second);

    Ok(())
}

/// Several bindings share one base directory; the aggregator compares them.
#[test]
fn test_runs_then_aggregate_to_svg() -> Result<()> {
    crate::test_setup!();
    let mut harness = TestHarness::new()?;
    harness.compare(&["java", "rust", "python"]);

    for implementation in ["java", "rust", "python"] {
        let config = harness.config_for(implementation);
        let store = ParquetStore::new(&config.store);
        Pipeline::new(&config, &store).run(&Stage::ALL)?;
    }

    let config = harness.config();
    let report = aggregate::aggregate(
        config,
        &config.aggregate.implementations,
        &Operation::ALL,
        &PlottersRenderer,
    );
    assert!(report.is_success(), "{:?}", report.failures);
    assert_eq!(report.charts.len(), 3);

    for operation in Operation::ALL {
        let chart = &report.charts[&operation];
        assert_eq!(chart.labels(), vec!["java", "rust", "python"]);
        assert!(chart.dataset_size_bytes.unwrap_or(0) > 0);

        let path = harness.chart_dir().join(chart.file_name());
        assert!(path.exists(), "missing chart {}", path.display());
    }

    let random = &report.charts[&Operation::ReadRandom];
    assert!(random
        .title
        .ends_with(&format!("(Taking {} random indices from {} rows)", TEST_SAMPLE_SIZE, TEST_ROW_COUNT)));

    Ok(())
}
