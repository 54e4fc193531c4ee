//! Test doubles for the manager seams.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;

use super::error::{ManagerError, ManagerResult};
use super::traits::{PackageDownloader, ProgressCallback};

/// Write a ZIP archive with the given `(name, content)` entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, content) in entries {
        writer
            .start_file(name.to_string(), SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Downloader that copies fixture files instead of using the network.
///
/// URLs without a fixture fail with `DownloadFailed`.
#[derive(Debug, Default)]
pub struct FixtureDownloader {
    fixtures: HashMap<String, PathBuf>,
    fallback: Option<PathBuf>,
}

impl FixtureDownloader {
    /// Serve `path` for every URL.
    pub fn single(path: &Path) -> Self {
        Self {
            fixtures: HashMap::new(),
            fallback: Some(path.to_path_buf()),
        }
    }

    /// Serve `path` for `url`.
    pub fn with(mut self, url: &str, path: &Path) -> Self {
        self.fixtures.insert(url.to_string(), path.to_path_buf());
        self
    }
}

impl PackageDownloader for FixtureDownloader {
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64> {
        self.download_with_progress(url, dest, cancel, Box::new(|_, _| {}))
    }

    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> ManagerResult<u64> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }
        let source = self
            .fixtures
            .get(url)
            .or(self.fallback.as_ref())
            .ok_or_else(|| ManagerError::DownloadFailed {
                url: url.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| ManagerError::create_dir(parent, e))?;
        }
        let size = fs::copy(source, dest).map_err(|e| ManagerError::write(dest, e))?;
        on_progress(size, size);
        Ok(size)
    }
}
