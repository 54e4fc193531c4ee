//! Error types for the installation engine.

use std::io;
use std::path::PathBuf;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur while installing the framework or shader packages.
#[derive(Debug)]
pub enum ManagerError {
    /// Failed to read a file or directory.
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a file or directory.
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Failed to fetch a catalog document.
    CatalogFetchFailed { url: String, reason: String },

    /// Failed to parse a catalog document.
    CatalogParseFailed { url: String, reason: String },

    /// Failed to download an archive.
    DownloadFailed { url: String, reason: String },

    /// Archive extraction failed.
    ExtractionFailed { path: PathBuf, reason: String },

    /// The archive format was not recognized.
    UnsupportedArchive { path: PathBuf },

    /// No add-on binary could be found inside an add-on download.
    AddonBinaryMissing { addon: String },

    /// The request was rejected before any work started.
    Validation(String),

    /// Invalid configuration.
    InvalidConfig(String),

    /// HTTP request failed.
    HttpError(String),

    /// Network timeout.
    Timeout { url: String, timeout_secs: u64 },

    /// The operation was cancelled by the caller.
    Cancelled,
}

impl ManagerError {
    /// Whether this error represents a caller-initiated cancellation.
    ///
    /// Cancellation is a terminal outcome of its own and is never surfaced
    /// as an error message.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Message suitable for showing to a user verbatim.
    ///
    /// Never empty: falls back to the debug description when the display
    /// text is blank.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            format!("{:?}", self)
        } else {
            message
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ReadFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn create_dir(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CreateDirFailed {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn remove(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::RemoveFailed {
            path: path.into(),
            source,
        }
    }
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            Self::WriteFailed { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            Self::CreateDirFailed { path, source } => {
                write!(
                    f,
                    "failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::RemoveFailed { path, source } => {
                write!(f, "failed to remove {}: {}", path.display(), source)
            }
            Self::CatalogFetchFailed { url, reason } => {
                write!(f, "failed to fetch catalog from {}: {}", url, reason)
            }
            Self::CatalogParseFailed { url, reason } => {
                write!(f, "failed to parse catalog from {}: {}", url, reason)
            }
            Self::DownloadFailed { url, reason } => {
                write!(f, "failed to download {}: {}", url, reason)
            }
            Self::ExtractionFailed { path, reason } => {
                write!(f, "failed to extract {}: {}", path.display(), reason)
            }
            Self::UnsupportedArchive { path } => {
                write!(f, "unsupported archive format: {}", path.display())
            }
            Self::AddonBinaryMissing { addon } => {
                write!(f, "no add-on binary found in download for {}", addon)
            }
            Self::Validation(msg) => write!(f, "invalid request: {}", msg),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            Self::Timeout { url, timeout_secs } => {
                write!(f, "request to {} timed out after {}s", url, timeout_secs)
            }
            Self::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFailed { source, .. } => Some(source),
            Self::WriteFailed { source, .. } => Some(source),
            Self::CreateDirFailed { source, .. } => Some(source),
            Self::RemoveFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}
