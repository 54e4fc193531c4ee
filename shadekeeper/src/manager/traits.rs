//! Seams between the install sessions and their I/O collaborators.
//!
//! Sessions depend on these traits rather than on concrete HTTP or archive
//! implementations, so tests can substitute local fixtures.

use std::path::Path;

use tokio_util::sync::CancellationToken;

use super::error::ManagerResult;

/// Progress callback for a single download.
///
/// # Arguments
///
/// * `downloaded` - Bytes present in the destination file so far
///   (including any resumed prefix)
/// * `total` - Full size of the resource, or 0 when unknown
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Downloads a single resource to a file.
pub trait PackageDownloader: Send + Sync {
    /// Download `url` into `dest`, returning the final file size.
    ///
    /// Returns `ManagerError::Cancelled` if `cancel` fires mid-transfer.
    fn download(&self, url: &str, dest: &Path, cancel: &CancellationToken) -> ManagerResult<u64>;

    /// Download `url` into `dest`, reporting byte progress.
    fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressCallback,
    ) -> ManagerResult<u64>;
}

/// Extracts an archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extract every entry of `archive_path` below `dest_dir`.
    ///
    /// Returns the number of files written.
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<usize>;
}
