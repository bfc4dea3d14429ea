//! Configuration management for ColBench runs
//!
//! One `BenchConfig` is built at startup and handed by reference to every
//! component. The same TOML file is meant to be shared by every binding under
//! comparison so that row counts and sample sizes line up.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::Operation;

/// File name of the completion marker written after a successful run
pub const MANIFEST_FILE_NAME: &str = "run.json";

/// Stem of the dataset file inside an implementation directory
pub const DATASET_STEM: &str = "dataset";

/// Main benchmark configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Root directory holding one sub-directory per implementation
    pub base_dir: PathBuf,
    /// Implementation this process benchmarks, e.g. "rust"
    pub implementation: String,
    /// Rows in the synthetic dataset
    pub row_count: u64,
    /// Rows fetched by the random-read benchmark
    pub sample_size: u64,
    /// Rows per generated chunk handed to the writer
    pub batch_size: usize,
    /// Seed for random-read sampling; unseeded runs draw from OS entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Columns materialized by the read benchmarks
    pub columns: Vec<String>,
    pub store: StoreSettings,
    pub aggregate: AggregateSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Parquet codec: UNCOMPRESSED, SNAPPY, GZIP, LZ4, ZSTD
    pub compression: String,
    /// Maximum rows per Parquet row group
    pub max_row_group_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateSettings {
    /// Implementations to compare, in chart order
    pub implementations: Vec<String>,
    /// Implementation whose dataset size labels the charts
    pub reference_implementation: String,
    /// Where charts are written
    pub output_dir: PathBuf,
    /// Refuse results from runs that never wrote a completion manifest
    pub require_manifest: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./file_benchmark"),
            implementation: "rust".to_string(),
            row_count: 40_000_000,
            sample_size: 200,
            batch_size: 1024 * 1024,
            seed: None,
            columns: vec!["id".to_string(), "name".to_string()],
            store: StoreSettings::default(),
            aggregate: AggregateSettings::default(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            compression: "SNAPPY".to_string(),
            max_row_group_size: 1024 * 1024,
        }
    }
}

impl Default for AggregateSettings {
    fn default() -> Self {
        Self {
            implementations: vec!["java".to_string(), "rust".to_string(), "python".to_string()],
            reference_implementation: "java".to_string(),
            output_dir: PathBuf::from("."),
            require_manifest: false,
        }
    }
}

const KNOWN_CODECS: &[&str] = &["UNCOMPRESSED", "SNAPPY", "GZIP", "LZ4", "ZSTD"];

impl BenchConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: BenchConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn load_from_env() -> ConfigResult<Self> {
        let mut config = BenchConfig::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// File settings if `path` exists, defaults otherwise, then environment
    /// overrides from `lookup`
    pub fn resolve<P, F>(path: P, lookup: F) -> ConfigResult<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            BenchConfig::default()
        };
        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Apply environment overrides. `lookup` is `std::env::var` in the binary
    /// and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(home) = lookup("BENCH_HOME") {
            self.base_dir = PathBuf::from(home);
        }

        if let Some(implementation) = lookup("BENCH_IMPLEMENTATION") {
            self.implementation = implementation;
        }

        if let Some(rows) = lookup("BENCH_NUM_ROWS") {
            self.row_count = parse_env("BENCH_NUM_ROWS", &rows)?;
        }

        if let Some(take) = lookup("BENCH_NUM_TAKE") {
            self.sample_size = parse_env("BENCH_NUM_TAKE", &take)?;
        }

        if let Some(seed) = lookup("BENCH_SEED") {
            self.seed = Some(parse_env("BENCH_SEED", &seed)?);
        }

        Ok(())
    }

    /// Validate the settings a benchmark run depends on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_dir".to_string(),
            });
        }

        validate_implementation_id("implementation", &self.implementation)?;

        if self.row_count == 0 {
            return Err(invalid("row_count", self.row_count));
        }

        if self.row_count > i64::MAX as u64 {
            return Err(ConfigError::ValidationFailed {
                reason: format!("row_count {} does not fit a signed 64-bit id", self.row_count),
            });
        }

        if self.sample_size == 0 {
            return Err(invalid("sample_size", self.sample_size));
        }

        if self.sample_size > self.row_count {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "sample_size {} exceeds row_count {}",
                    self.sample_size, self.row_count
                ),
            });
        }

        if self.batch_size == 0 {
            return Err(invalid("batch_size", self.batch_size));
        }

        if self.columns.is_empty() {
            return Err(ConfigError::MissingField {
                field: "columns".to_string(),
            });
        }

        if !KNOWN_CODECS.contains(&self.store.compression.to_uppercase().as_str()) {
            return Err(invalid("store.compression", &self.store.compression));
        }

        if self.store.max_row_group_size == 0 {
            return Err(invalid("store.max_row_group_size", self.store.max_row_group_size));
        }

        Ok(())
    }

    /// Validate the settings the aggregator depends on
    pub fn validate_aggregate(&self) -> ConfigResult<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_dir".to_string(),
            });
        }

        if self.aggregate.implementations.is_empty() {
            return Err(ConfigError::MissingField {
                field: "aggregate.implementations".to_string(),
            });
        }

        for implementation in &self.aggregate.implementations {
            validate_implementation_id("aggregate.implementations", implementation)?;
        }

        if !self
            .aggregate
            .implementations
            .contains(&self.aggregate.reference_implementation)
        {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "reference implementation '{}' is not among the compared implementations",
                    self.aggregate.reference_implementation
                ),
            });
        }

        if self.sample_size > self.row_count {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "sample_size {} exceeds row_count {}",
                    self.sample_size, self.row_count
                ),
            });
        }

        Ok(())
    }

    /// Directory owned by one implementation
    pub fn implementation_dir_for(&self, implementation: &str) -> PathBuf {
        self.base_dir.join(implementation)
    }

    /// Directory owned by the configured implementation
    pub fn implementation_dir(&self) -> PathBuf {
        self.implementation_dir_for(&self.implementation)
    }

    /// Dataset location for one implementation with the store's extension
    pub fn dataset_path_for(&self, implementation: &str, extension: &str) -> PathBuf {
        self.implementation_dir_for(implementation)
            .join(format!("{}.{}", DATASET_STEM, extension))
    }

    pub fn dataset_path(&self, extension: &str) -> PathBuf {
        self.dataset_path_for(&self.implementation, extension)
    }

    /// Log location keyed by (implementation, operation)
    pub fn log_path_for(&self, implementation: &str, operation: Operation) -> PathBuf {
        self.implementation_dir_for(implementation)
            .join(operation.log_file_name())
    }

    pub fn log_path(&self, operation: Operation) -> PathBuf {
        self.log_path_for(&self.implementation, operation)
    }

    pub fn manifest_path_for(&self, implementation: &str) -> PathBuf {
        self.implementation_dir_for(implementation)
            .join(MANIFEST_FILE_NAME)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest_path_for(&self.implementation)
    }

    /// Column names as borrowed slices for the store API
    pub fn column_refs(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: key.to_string(),
        value: value.to_string(),
    })
}

fn invalid(field: &str, value: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// Implementation ids become directory names, so they must be exactly one
/// normal path component.
fn validate_implementation_id(field: &str, id: &str) -> ConfigResult<()> {
    if id.is_empty() {
        return Err(ConfigError::MissingField {
            field: field.to_string(),
        });
    }

    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid(field, id)),
    }
}
