//! Tracing subscriber setup.
//!
//! Logs go to stderr and to a daily-rolling file in the log directory.
//! `RUST_LOG` overrides the configured level.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::default_log_dir;

/// File name prefix of the rolling log files.
pub const LOG_FILE_PREFIX: &str = "shadekeeper.log";

/// How to set up logging.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `shadekeeper=debug`.
    pub level: String,
    /// Directory for rolling log files.
    pub directory: PathBuf,
    /// Also write to stderr.
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LoggingConfig {
    /// Create a config with the given default level.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            directory: default_log_dir(),
            stderr: true,
        }
    }

    /// Set the log directory.
    pub fn with_directory(mut self, directory: PathBuf) -> Self {
        self.directory = directory;
        self
    }

    /// Enable or disable the stderr layer.
    pub fn with_stderr(mut self, stderr: bool) -> Self {
        self.stderr = stderr;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the file writer. Fails if the log directory cannot be
/// created or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<WorkerGuard, std::io::Error> {
    std::fs::create_dir_all(&config.directory)?;

    let appender = tracing_appender::rolling::daily(&config.directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339());

    let stderr_layer = config.stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    tracing::debug!(directory = %config.directory.display(), "Logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = LoggingConfig::new("debug")
            .with_directory(PathBuf::from("/tmp/logs"))
            .with_stderr(false);
        assert_eq!(config.level, "debug");
        assert_eq!(config.directory, PathBuf::from("/tmp/logs"));
        assert!(!config.stderr);
    }

    #[test]
    fn test_bad_level_falls_back() {
        let config = LoggingConfig::new("not a [level");
        // Building the filter must not panic whatever the input.
        let _ = config.env_filter();
    }
}
