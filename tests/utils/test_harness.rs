use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::TempDir;

use colbench_benchmarks::recorder::{self, ResultLog};
use colbench_benchmarks::{BenchConfig, Operation};

use crate::{TEST_ROW_COUNT, TEST_SAMPLE_SIZE, TEST_SEED};

/// A throwaway base directory with a small, seeded configuration.
///
/// Everything lives under one `TempDir` that is removed on drop.
pub struct TestHarness {
    temp_dir: TempDir,
    config: BenchConfig,
}

impl TestHarness {
    pub fn new() -> Result<Self> {
        Self::with_rows(TEST_ROW_COUNT, TEST_SAMPLE_SIZE)
    }

    pub fn with_rows(row_count: u64, sample_size: u64) -> Result<Self> {
        let temp_dir = TempDir::new()?;

        let mut config = BenchConfig {
            base_dir: temp_dir.path().join("file_benchmark"),
            implementation: "rust".to_string(),
            row_count,
            sample_size,
            batch_size: 256,
            seed: Some(TEST_SEED),
            ..BenchConfig::default()
        };
        config.store.max_row_group_size = 300;
        config.aggregate.output_dir = temp_dir.path().join("charts");

        Ok(Self { temp_dir, config })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// The harness configuration, recording under another implementation id
    pub fn config_for(&self, implementation: &str) -> BenchConfig {
        BenchConfig {
            implementation: implementation.to_string(),
            ..self.config.clone()
        }
    }

    /// Compare `implementations` in aggregation, the first one being the
    /// reference.
    pub fn compare(&mut self, implementations: &[&str]) {
        self.config.aggregate.implementations =
            implementations.iter().map(|s| s.to_string()).collect();
        if let Some(first) = implementations.first() {
            self.config.aggregate.reference_implementation = first.to_string();
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn chart_dir(&self) -> PathBuf {
        self.config.aggregate.output_dir.clone()
    }

    /// Drop a result log as another binding would have written it
    pub fn write_result(
        &self,
        implementation: &str,
        operation: Operation,
        elapsed_ms: f64,
        cardinality: u64,
    ) -> Result<()> {
        let path = self.config.log_path_for(implementation, operation);
        recorder::write_log(
            &path,
            &ResultLog {
                elapsed_ms,
                cardinality,
            },
        )?;
        Ok(())
    }

    /// Drop a dataset of `bytes` bytes for `implementation`
    pub fn write_dataset_stub(&self, implementation: &str, bytes: usize) -> Result<PathBuf> {
        let path = self.config.dataset_path_for(implementation, "parquet");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, vec![0u8; bytes])?;
        Ok(path)
    }
}
