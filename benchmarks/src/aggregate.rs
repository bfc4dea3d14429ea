//! Cross-run aggregation
//!
//! Reads the result logs every implementation left under the shared base
//! directory and renders one comparison chart per operation. A failure for
//! one operation never stops the others; every failure ends up in the
//! returned [`AggregateReport`].

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chart::{Bar, ChartRenderer, ComparisonChart};
use crate::config::{BenchConfig, DATASET_STEM};
use crate::error::AggregateError;
use crate::manifest::RunManifest;
use crate::recorder;
use crate::utils::format::bytes_human;
use crate::utils::fs::{dataset_size_bytes, whole_megabytes};
use crate::Operation;

/// Everything one aggregation produced
#[derive(Debug, Default)]
pub struct AggregateReport {
    /// Charts that were rendered, keyed by operation
    pub charts: BTreeMap<Operation, ComparisonChart>,
    pub failures: Vec<AggregateError>,
}

impl AggregateReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Chart title for `operation`
pub fn chart_title(
    operation: Operation,
    dataset_size_bytes: Option<u64>,
    sample_size: u64,
    row_count: u64,
) -> String {
    let size = match dataset_size_bytes {
        Some(bytes) => format!("{} MB", whole_megabytes(bytes)),
        None => "unknown".to_string(),
    };

    let mut title = format!(
        "Time for {} operation. Data size: {} ",
        operation.file_stem(),
        size
    );
    if operation == Operation::ReadRandom {
        title.push_str(&format!(
            "\n(Taking {} random indices from {} rows)",
            sample_size, row_count
        ));
    }
    title
}

/// Aggregate `operations` across `implementations`, in the given order.
pub fn aggregate(
    config: &BenchConfig,
    implementations: &[String],
    operations: &[Operation],
    renderer: &dyn ChartRenderer,
) -> AggregateReport {
    let mut report = AggregateReport::default();

    let output_dir = config.aggregate.output_dir.clone();
    let output_ready = match fs::create_dir_all(&output_dir) {
        Ok(()) => true,
        Err(source) => {
            report.failures.push(AggregateError::Output {
                path: output_dir.clone(),
                source,
            });
            false
        }
    };

    let blocked = check_manifests(config, implementations, &mut report.failures);

    let reference = reference_implementation(config, implementations);
    let dataset_size = reference.and_then(|r| measure_reference(config, r, &mut report.failures));

    for &operation in operations {
        let Some(bars) = collect_bars(config, implementations, operation, &blocked, &mut report.failures)
        else {
            warn!("Skipping {} chart: results incomplete", operation);
            continue;
        };

        let chart = ComparisonChart {
            operation,
            title: chart_title(operation, dataset_size, config.sample_size, config.row_count),
            bars,
            dataset_size_bytes: dataset_size,
        };

        if !output_ready {
            continue;
        }

        let path = output_dir.join(chart.file_name());
        match renderer.render(&chart, &path) {
            Ok(()) => {
                info!("Rendered {} chart to {}", operation, path.display());
                report.charts.insert(operation, chart);
            }
            Err(e) => report.failures.push(AggregateError::Render {
                operation,
                path,
                reason: e.reason,
            }),
        }
    }

    for failure in &report.failures {
        warn!("{}", failure);
    }
    report
}

fn reference_implementation<'a>(
    config: &'a BenchConfig,
    implementations: &'a [String],
) -> Option<&'a str> {
    let configured = &config.aggregate.reference_implementation;
    if implementations.contains(configured) {
        Some(configured.as_str())
    } else {
        implementations.first().map(String::as_str)
    }
}

/// Implementations whose runs cannot be trusted against this configuration.
fn check_manifests(
    config: &BenchConfig,
    implementations: &[String],
    failures: &mut Vec<AggregateError>,
) -> HashSet<String> {
    let mut blocked = HashSet::new();

    for implementation in implementations {
        let path = config.manifest_path_for(implementation);
        let manifest = match RunManifest::read(&path) {
            Ok(manifest) => manifest,
            Err(e) => {
                failures.push(AggregateError::Manifest {
                    implementation: implementation.clone(),
                    reason: e.to_string(),
                });
                blocked.insert(implementation.clone());
                continue;
            }
        };

        let Some(manifest) = manifest else {
            if config.aggregate.require_manifest {
                failures.push(AggregateError::IncompleteRun {
                    implementation: implementation.clone(),
                    path,
                });
                blocked.insert(implementation.clone());
            }
            continue;
        };

        let checks = [
            ("row_count", manifest.row_count, config.row_count),
            ("sample_size", manifest.sample_size, config.sample_size),
        ];
        for (field, recorded, expected) in checks {
            if recorded != expected {
                failures.push(AggregateError::ConfigMismatch {
                    implementation: implementation.clone(),
                    field,
                    recorded,
                    expected,
                });
                blocked.insert(implementation.clone());
            }
        }
    }

    blocked
}

/// One bar per implementation, or `None` if any of them is unusable.
fn collect_bars(
    config: &BenchConfig,
    implementations: &[String],
    operation: Operation,
    blocked: &HashSet<String>,
    failures: &mut Vec<AggregateError>,
) -> Option<Vec<Bar>> {
    let mut bars = Vec::with_capacity(implementations.len());
    let mut complete = true;

    for implementation in implementations {
        if blocked.contains(implementation) {
            complete = false;
            continue;
        }

        match recorder::load(config, implementation, operation) {
            Ok(log) => bars.push(Bar {
                implementation: implementation.clone(),
                elapsed_ms: log.elapsed_ms,
            }),
            Err(source) => {
                failures.push(AggregateError::Result {
                    implementation: implementation.clone(),
                    operation,
                    source,
                });
                complete = false;
            }
        }
    }

    complete.then_some(bars)
}

fn measure_reference(
    config: &BenchConfig,
    implementation: &str,
    failures: &mut Vec<AggregateError>,
) -> Option<u64> {
    let dir = config.implementation_dir_for(implementation);
    let path = match find_dataset(&dir) {
        Some(path) => path,
        None => {
            failures.push(AggregateError::DatasetSize {
                path: dir.join(DATASET_STEM),
                reason: "no dataset found".to_string(),
            });
            return None;
        }
    };

    match dataset_size_bytes(&path) {
        Ok(bytes) => {
            info!(
                "Reference dataset {} is {}",
                path.display(),
                bytes_human(bytes as f64)
            );
            Some(bytes)
        }
        Err(e) => {
            failures.push(AggregateError::DatasetSize {
                path,
                reason: e.to_string(),
            });
            None
        }
    }
}

/// The `dataset.<ext>` entry of an implementation directory, file or
/// directory, whatever the binding's extension.
fn find_dataset(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_stem().and_then(|s| s.to_str()) == Some(DATASET_STEM)
                && path.extension().and_then(|e| e.to_str()) != Some("tmp")
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}
