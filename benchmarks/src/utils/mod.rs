//! Utility helpers for ColBench

use std::time::{Duration, Instant};

/// Timer utility for measuring execution time
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed().as_nanos() as f64 / 1_000_000.0
    }
}

/// Format utilities
pub mod format {
    use std::time::Duration;

    pub fn duration_human(duration: Duration) -> String {
        let total_secs = duration.as_secs();
        let hours = total_secs / 3600;
        let minutes = (total_secs % 3600) / 60;
        let seconds = total_secs % 60;
        let millis = duration.subsec_millis();

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else if seconds > 0 {
            format!("{}.{:03}s", seconds, millis)
        } else {
            format!("{}ms", duration.as_millis())
        }
    }

    /// Milliseconds as recorded in a result log, rendered for humans
    pub fn millis_human(elapsed_ms: f64) -> String {
        if !elapsed_ms.is_finite() || elapsed_ms < 0.0 {
            return format!("{} ms", elapsed_ms);
        }
        duration_human(Duration::from_secs_f64(elapsed_ms / 1000.0))
    }

    pub fn bytes_human(bytes: f64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

        if bytes == 0.0 {
            return "0 B".to_string();
        }

        let i = (bytes.log10() / 3.0).floor() as usize;
        let size = bytes / 1000_f64.powi(i as i32);

        if i < UNITS.len() {
            format!("{:.2} {}", size, UNITS[i])
        } else {
            format!("{:.2} PB", bytes / 1000_f64.powi(5))
        }
    }

    pub fn rate_human(rate: f64, unit: &str) -> String {
        if rate >= 1_000_000.0 {
            format!("{:.2}M {}/s", rate / 1_000_000.0, unit)
        } else if rate >= 1_000.0 {
            format!("{:.2}K {}/s", rate / 1_000.0, unit)
        } else {
            format!("{:.2} {}/s", rate, unit)
        }
    }
}

/// System utilities
pub mod system {
    use serde::{Deserialize, Serialize};

    /// Facts about the machine a run executed on
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SystemInfo {
        pub os: String,
        pub arch: String,
        pub cpu_count: usize,
        pub hostname: String,
    }

    pub fn get_system_info() -> std::io::Result<SystemInfo> {
        Ok(SystemInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: num_cpus::get(),
            hostname: hostname::get()?.to_string_lossy().to_string(),
        })
    }
}

/// Filesystem utilities
pub mod fs {
    use std::path::Path;
    use walkdir::WalkDir;

    /// Total size in bytes of a file, or of every file below a directory.
    ///
    /// Symlinks are not followed.
    pub fn dataset_size_bytes(path: &Path) -> Result<u64, walkdir::Error> {
        let mut total = 0u64;
        for entry in WalkDir::new(path) {
            let entry = entry?;
            if entry.file_type().is_file() {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }

    /// Whole mebibytes, truncated
    pub fn whole_megabytes(bytes: u64) -> u64 {
        bytes / 1024 / 1024
    }
}
