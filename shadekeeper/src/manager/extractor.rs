//! Archive extraction for framework and package installation.
//!
//! This module handles:
//! - Detecting the archive format from its leading bytes
//! - Extracting ZIP, 7z and gzip-compressed tar archives
//! - Creating uniquely named scratch directories that are always removed

use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::error::{ManagerError, ManagerResult};
use super::traits::ArchiveExtractor;

/// Archive formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    /// PKZIP archive.
    Zip,
    /// Windows executable that may carry an appended ZIP payload.
    ///
    /// Framework setup programs ship this way; the ZIP reader locates the
    /// central directory from the end of the file.
    SelfExtracting,
    /// 7-Zip archive.
    SevenZip,
    /// gzip-compressed tarball.
    TarGz,
}

impl ArchiveKind {
    /// Detect the format of an archive on disk.
    ///
    /// Returns `None` if the leading bytes match no supported format.
    pub fn detect(path: &Path) -> ManagerResult<Option<Self>> {
        let mut file = File::open(path).map_err(|e| ManagerError::read(path, e))?;
        let mut magic = [0u8; 6];
        let read = read_prefix(&mut file, &mut magic).map_err(|e| ManagerError::read(path, e))?;
        Ok(Self::from_magic(&magic[..read]))
    }

    fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            [b'P', b'K', 3, 4, ..] | [b'P', b'K', 5, 6, ..] => Some(Self::Zip),
            [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, ..] => Some(Self::SevenZip),
            [0x1F, 0x8B, ..] => Some(Self::TarGz),
            [b'M', b'Z', ..] => Some(Self::SelfExtracting),
            _ => None,
        }
    }
}

/// Extractor backed by pure-Rust archive readers.
#[derive(Debug, Default)]
pub struct NativeExtractor;

impl NativeExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract a ZIP archive (or a ZIP payload appended to an executable).
    fn extract_zip(
        &self,
        archive: &Path,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<usize> {
        let file = File::open(archive).map_err(|e| ManagerError::read(archive, e))?;
        let mut zip =
            zip::ZipArchive::new(BufReader::new(file)).map_err(|e| {
                ManagerError::ExtractionFailed {
                    path: archive.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;

        let mut count = 0;
        for i in 0..zip.len() {
            if cancel.is_cancelled() {
                return Err(ManagerError::Cancelled);
            }

            let mut entry = zip.by_index(i).map_err(|e| ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: e.to_string(),
            })?;

            let Some(relative) = entry.enclosed_name() else {
                tracing::warn!(entry = %entry.name(), "Skipping archive entry outside extraction root");
                continue;
            };
            let out_path = dest_dir.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)
                    .map_err(|e| ManagerError::create_dir(&out_path, e))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(|e| ManagerError::create_dir(parent, e))?;
            }

            let mut out_file =
                File::create(&out_path).map_err(|e| ManagerError::write(&out_path, e))?;
            io::copy(&mut entry, &mut out_file).map_err(|e| ManagerError::write(&out_path, e))?;
            count += 1;
        }

        Ok(count)
    }

    /// Extract a gzip-compressed tarball.
    fn extract_tar_gz(
        &self,
        archive: &Path,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<usize> {
        let file = File::open(archive).map_err(|e| ManagerError::read(archive, e))?;
        let mut tarball = tar::Archive::new(GzDecoder::new(BufReader::new(file)));

        let extraction_error = |e: io::Error| ManagerError::ExtractionFailed {
            path: archive.to_path_buf(),
            reason: e.to_string(),
        };

        let mut count = 0;
        for entry in tarball.entries().map_err(extraction_error)? {
            if cancel.is_cancelled() {
                return Err(ManagerError::Cancelled);
            }

            let mut entry = entry.map_err(extraction_error)?;
            let is_file = entry.header().entry_type().is_file();
            // unpack_in refuses entries that would land outside dest_dir
            let unpacked = entry.unpack_in(dest_dir).map_err(extraction_error)?;
            if unpacked && is_file {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Extract a 7z archive.
    fn extract_7z(
        &self,
        archive: &Path,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<usize> {
        extract_7z_entries(archive, dest_dir, cancel, |_| {})
    }
}

/// Extract a 7z archive entry by entry, checking `cancel` before each one.
///
/// `on_entry` runs after every extracted entry with its name.
fn extract_7z_entries(
    archive: &Path,
    dest_dir: &Path,
    cancel: &CancellationToken,
    mut on_entry: impl FnMut(&str),
) -> ManagerResult<usize> {
    if cancel.is_cancelled() {
        return Err(ManagerError::Cancelled);
    }

    let result = sevenz_rust::decompress_file_with_extract_fn(
        archive,
        dest_dir,
        |entry, reader, dest| {
            if cancel.is_cancelled() {
                return Err(sevenz_rust::Error::other("extraction cancelled"));
            }
            // Archives built from a directory carry an unnamed root entry.
            if entry.name().is_empty() {
                return Ok(true);
            }
            if !is_enclosed(entry.name()) {
                tracing::warn!(entry = entry.name(), "Skipping archive entry outside the target");
                // Solid blocks are read sequentially, so the entry still has
                // to be consumed.
                io::copy(reader, &mut io::sink())?;
                return Ok(true);
            }
            let extracted = sevenz_rust::default_entry_extract_fn(entry, reader, dest)?;
            on_entry(entry.name());
            Ok(extracted)
        },
    );

    if cancel.is_cancelled() {
        return Err(ManagerError::Cancelled);
    }
    result.map_err(|e| ManagerError::ExtractionFailed {
        path: archive.to_path_buf(),
        reason: e.to_string(),
    })?;

    count_files_recursive(dest_dir)
}

/// Whether an archive entry name stays below the extraction root.
fn is_enclosed(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

impl ArchiveExtractor for NativeExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<usize> {
        let kind = ArchiveKind::detect(archive_path)?.ok_or_else(|| {
            ManagerError::UnsupportedArchive {
                path: archive_path.to_path_buf(),
            }
        })?;

        fs::create_dir_all(dest_dir).map_err(|e| ManagerError::create_dir(dest_dir, e))?;

        tracing::debug!(
            archive = %archive_path.display(),
            dest = %dest_dir.display(),
            kind = ?kind,
            "Extracting archive"
        );

        match kind {
            ArchiveKind::Zip => self.extract_zip(archive_path, dest_dir, cancel),
            ArchiveKind::SelfExtracting => self
                .extract_zip(archive_path, dest_dir, cancel)
                .map_err(|e| match e {
                    ManagerError::ExtractionFailed { path, .. } => {
                        ManagerError::UnsupportedArchive { path }
                    }
                    other => other,
                }),
            ArchiveKind::SevenZip => self.extract_7z(archive_path, dest_dir, cancel),
            ArchiveKind::TarGz => self.extract_tar_gz(archive_path, dest_dir, cancel),
        }
    }
}

/// A uniquely named scratch directory inside the staging area.
///
/// The directory is removed by [`ScratchDir::cleanup`] or, on any other exit
/// path, when the guard is dropped. Removal failures are logged rather than
/// returned so they never mask the outcome of the operation.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    /// Create a fresh scratch directory below `parent`.
    pub fn create_in(parent: &Path, prefix: &str) -> ManagerResult<Self> {
        fs::create_dir_all(parent).map_err(|e| ManagerError::create_dir(parent, e))?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|e| ManagerError::create_dir(parent, e))?;
        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the scratch directory now.
    pub fn cleanup(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch directory"
                );
            }
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Count files recursively in a directory.
fn count_files_recursive(dir: &Path) -> ManagerResult<usize> {
    let mut count = 0;

    if !dir.exists() {
        return Ok(0);
    }

    let entries = fs::read_dir(dir).map_err(|e| ManagerError::read(dir, e))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() {
            count += 1;
        } else if path.is_dir() {
            count += count_files_recursive(&path)?;
        }
    }

    Ok(count)
}

fn read_prefix(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
