//! Configuration for the install sessions.

use std::path::PathBuf;
use std::time::Duration;

/// Default sampling interval for progress snapshots.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration shared by framework and package install sessions.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory for downloaded archives and scratch extraction directories.
    pub staging_dir: PathBuf,

    /// HTTP connect timeout.
    pub timeout: Duration,

    /// How often progress snapshots are sampled for observers.
    pub progress_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            staging_dir: std::env::temp_dir().join("shadekeeper"),
            timeout: Duration::from_secs(300),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration with the given staging directory.
    pub fn new(staging_dir: PathBuf) -> Self {
        Self {
            staging_dir,
            ..Default::default()
        }
    }

    /// Set the staging directory.
    pub fn with_staging_dir(mut self, path: PathBuf) -> Self {
        self.staging_dir = path;
        self
    }

    /// Set the HTTP connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the progress sampling interval.
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }
}
