//! Run completion marker
//!
//! `run.json` is removed when a run starts and written only once every
//! requested stage has succeeded, so its presence vouches for the logs next
//! to it.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::recorder;
use crate::utils::system::{self, SystemInfo};
use crate::Operation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub implementation: String,
    pub row_count: u64,
    pub sample_size: u64,
    pub stages: Vec<Operation>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub host: SystemInfo,
}

impl RunManifest {
    /// Describe a run of `config` that began at `started_at` and just
    /// finished.
    pub fn completed(
        config: &BenchConfig,
        stages: Vec<Operation>,
        started_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            implementation: config.implementation.clone(),
            row_count: config.row_count,
            sample_size: config.sample_size,
            stages,
            started_at,
            finished_at: Utc::now(),
            host: system::get_system_info()?,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        recorder::atomic_write(path, &json)?;
        Ok(())
    }

    /// Read a manifest. A missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(BenchError::Io(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Delete a stale manifest. Returns whether one existed.
    pub fn remove(path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BenchError::Io(e)),
        }
    }
}
