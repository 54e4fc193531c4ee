//! Framework install session.
//!
//! Orchestrates one install of a framework release archive into a live
//! install directory:
//!
//! ```text
//! Idle -> Downloading -> Extracting -> Finished
//!              |              |
//!              +-> Error  <---+
//!              +-> Cancelled <+
//! ```
//!
//! Local archives skip `Downloading`. The extraction phase extracts into a
//! scratch directory, reconciles the `Presets` subtree, merge-copies the
//! scratch tree into the target and removes the scratch directory and, for
//! remote sources, the downloaded archive.
//!
//! Cancellation is honoured up to the point where the live directory is
//! first written; from there the merge runs to completion.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::config::ManagerConfig;
use super::download::{calculate_file_checksum, HttpDownloader};
use super::error::{ManagerError, ManagerResult};
use super::extractor::{NativeExtractor, ScratchDir};
use super::merge::merge_copy;
use super::presets::{PresetsPolicy, PresetsReconciler};
use super::state::{SessionState, StateCell};
use super::traits::{ArchiveExtractor, PackageDownloader};
use super::version::{infer_version_from_filename, FrameworkVersionRecord, VersionSource};

/// Prefix marking a source as an archive already on disk.
pub const LOCAL_FILE_MARKER: &str = "file://";

/// Where the framework archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// Download from an HTTP(S) URL.
    Remote(String),
    /// Use an archive already on disk.
    Local(PathBuf),
}

impl InstallSource {
    /// Interpret a source string.
    ///
    /// `file://` sources and bare paths of existing files are local; anything
    /// else is treated as a URL.
    pub fn parse(source: &str) -> Self {
        let trimmed = source.trim();
        if let Some(path) = trimmed.strip_prefix(LOCAL_FILE_MARKER) {
            return Self::Local(PathBuf::from(path));
        }
        let path = Path::new(trimmed);
        if path.is_file() {
            return Self::Local(path.to_path_buf());
        }
        Self::Remote(trimmed.to_string())
    }

    /// Whether the archive has to be downloaded.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// File name of the archive, if one can be derived.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Local(path) => path.file_name()?.to_str().map(str::to_string),
            Self::Remote(url) => {
                let parsed = reqwest::Url::parse(url).ok()?;
                let name = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
                Some(name.to_string())
            }
        }
    }
}

/// A request to install or update the framework.
#[derive(Debug, Clone)]
pub struct FrameworkInstallRequest {
    pub source: InstallSource,
    pub target_dir: PathBuf,
    pub policy: PresetsPolicy,
    pub version_tag: Option<String>,
    /// Where to write the version record after a successful install.
    pub record_path: Option<PathBuf>,
    /// Delete the partial archive when cancelled while downloading.
    pub discard_partial_on_cancel: bool,
}

impl FrameworkInstallRequest {
    /// Create a request with the default `Overwrite` policy.
    pub fn new(source: &str, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: InstallSource::parse(source),
            target_dir: target_dir.into(),
            policy: PresetsPolicy::default(),
            version_tag: None,
            record_path: None,
            discard_partial_on_cancel: false,
        }
    }

    /// Set the presets policy.
    pub fn with_policy(mut self, policy: PresetsPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the version tag of the archive.
    pub fn with_version_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        self.version_tag = if tag.trim().is_empty() { None } else { Some(tag) };
        self
    }

    /// Write a version record to `path` after a successful install.
    pub fn with_record_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// Delete the partial archive on cancellation instead of keeping it.
    pub fn with_discard_partial_on_cancel(mut self, discard: bool) -> Self {
        self.discard_partial_on_cancel = discard;
        self
    }

    /// Reject requests that cannot succeed before any work starts.
    pub fn validate(&self) -> ManagerResult<()> {
        if self.target_dir.as_os_str().is_empty() {
            return Err(ManagerError::Validation(
                "target directory must not be empty".to_string(),
            ));
        }
        match &self.source {
            InstallSource::Remote(url) if url.is_empty() => Err(ManagerError::Validation(
                "a source URL or archive path is required".to_string(),
            )),
            InstallSource::Remote(url)
                if !(url.starts_with("http://") || url.starts_with("https://")) =>
            {
                Err(ManagerError::Validation(format!(
                    "source is neither an existing file nor an HTTP URL: {}",
                    url
                )))
            }
            InstallSource::Local(path) if !path.is_file() => Err(ManagerError::Validation(
                format!("archive not found: {}", path.display()),
            )),
            _ => Ok(()),
        }
    }

    /// The version tag, falling back to one inferred from the archive name.
    pub fn effective_version_tag(&self) -> Option<String> {
        self.version_tag.clone().or_else(|| {
            self.source
                .file_name()
                .and_then(|name| infer_version_from_filename(Path::new(&name)))
        })
    }
}

/// Point-in-time view of a framework session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkProgress {
    pub state: SessionState,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub error_message: String,
}

/// Live counters of a framework session, written by its worker only.
#[derive(Debug, Default)]
pub struct FrameworkStatus {
    state: StateCell,
    total_bytes: AtomicU64,
    downloaded_bytes: AtomicU64,
    error_message: Mutex<String>,
}

impl FrameworkStatus {
    /// Take a snapshot.
    pub fn snapshot(&self) -> FrameworkProgress {
        FrameworkProgress {
            state: self.state.get(),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            downloaded_bytes: self.downloaded_bytes.load(Ordering::Relaxed),
            error_message: self.error_message.lock().clone(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    fn advance(&self, state: SessionState) {
        if self.state.advance(state) {
            tracing::debug!(state = state.name(), "Framework session state");
        }
    }

    fn set_bytes(&self, downloaded: u64, total: u64) {
        // Publish the total first so observers never see downloaded > total.
        if total > 0 {
            self.total_bytes.store(total, Ordering::Relaxed);
        }
        let total = self.total_bytes.load(Ordering::Relaxed);
        let downloaded = if total > 0 { downloaded.min(total) } else { downloaded };
        self.downloaded_bytes.store(downloaded, Ordering::Relaxed);
    }

    fn fail(&self, error: &ManagerError) {
        if error.is_cancelled() {
            self.advance(SessionState::Cancelled);
            return;
        }
        *self.error_message.lock() = error.user_message();
        self.advance(SessionState::Error);
    }
}

/// Result of a successful framework install.
#[derive(Debug, Clone)]
pub struct FrameworkInstallOutcome {
    pub version: Option<String>,
    pub installed_files: Vec<PathBuf>,
    pub record: Option<FrameworkVersionRecord>,
}

/// Handle to a framework install running on a background thread.
pub struct FrameworkInstallHandle {
    status: Arc<FrameworkStatus>,
    cancellation: CancellationToken,
    thread: Option<JoinHandle<ManagerResult<FrameworkInstallOutcome>>>,
}

impl FrameworkInstallHandle {
    /// Current progress snapshot.
    pub fn progress(&self) -> FrameworkProgress {
        self.status.snapshot()
    }

    /// Shared status, for progress bridges.
    pub fn status(&self) -> Arc<FrameworkStatus> {
        Arc::clone(&self.status)
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        tracing::info!("Framework install cancellation requested");
        self.cancellation.cancel();
    }

    /// The session's cancellation token.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Whether the worker has stopped.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Block until the worker stops and return its result.
    pub fn wait(mut self) -> ManagerResult<FrameworkInstallOutcome> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                Err(ManagerError::Validation(
                    "framework install worker panicked".to_string(),
                ))
            }),
            None => Err(ManagerError::Validation(
                "framework install already awaited".to_string(),
            )),
        }
    }
}

/// Installs framework archives.
///
/// Generic over the download and extraction seams so tests can run it
/// without a network.
pub struct FrameworkInstallSession<D = HttpDownloader, E = NativeExtractor> {
    downloader: Arc<D>,
    extractor: Arc<E>,
    config: ManagerConfig,
}

impl FrameworkInstallSession<HttpDownloader, NativeExtractor> {
    /// Create a session using HTTP downloads and the native extractor.
    pub fn with_config(config: ManagerConfig) -> Self {
        let downloader = HttpDownloader::with_timeout(config.timeout);
        Self::new(downloader, NativeExtractor::new(), config)
    }
}

impl<D, E> FrameworkInstallSession<D, E>
where
    D: PackageDownloader + 'static,
    E: ArchiveExtractor + 'static,
{
    /// Create a session from explicit collaborators.
    pub fn new(downloader: D, extractor: E, config: ManagerConfig) -> Self {
        Self {
            downloader: Arc::new(downloader),
            extractor: Arc::new(extractor),
            config,
        }
    }

    /// Validate `request` and run it on a background worker.
    ///
    /// Validation failures are returned immediately; nothing is started.
    pub fn start(&self, request: FrameworkInstallRequest) -> ManagerResult<FrameworkInstallHandle> {
        request.validate()?;

        let status = Arc::new(FrameworkStatus::default());
        let cancellation = CancellationToken::new();

        let worker = FrameworkInstallSession {
            downloader: Arc::clone(&self.downloader),
            extractor: Arc::clone(&self.extractor),
            config: self.config.clone(),
        };
        let worker_status = Arc::clone(&status);
        let worker_cancel = cancellation.clone();

        let thread = thread::Builder::new()
            .name("framework-install".to_string())
            .spawn(move || worker.run(&request, &worker_status, &worker_cancel))
            .map_err(|e| ManagerError::Validation(format!("cannot start worker: {}", e)))?;

        Ok(FrameworkInstallHandle {
            status,
            cancellation,
            thread: Some(thread),
        })
    }

    /// Run `request` on the current thread, updating `status` as it goes.
    pub fn run(
        &self,
        request: &FrameworkInstallRequest,
        status: &Arc<FrameworkStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<FrameworkInstallOutcome> {
        if let Err(e) = request.validate() {
            status.fail(&e);
            return Err(e);
        }

        tracing::info!(
            source = ?request.source,
            target = %request.target_dir.display(),
            policy = %request.policy,
            "Starting framework install"
        );

        let result = self.execute(request, status, cancel);
        match &result {
            Ok(outcome) => {
                status.advance(SessionState::Finished);
                tracing::info!(
                    files = outcome.installed_files.len(),
                    version = outcome.version.as_deref().unwrap_or("unknown"),
                    "Framework install finished"
                );
            }
            Err(e) if e.is_cancelled() => {
                status.fail(e);
                tracing::info!("Framework install cancelled");
            }
            Err(e) => {
                status.fail(e);
                tracing::error!(error = %e, "Framework install failed");
            }
        }
        result
    }

    fn execute(
        &self,
        request: &FrameworkInstallRequest,
        status: &Arc<FrameworkStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<FrameworkInstallOutcome> {
        let archive = match &request.source {
            InstallSource::Local(path) => {
                let size = fs::metadata(path)
                    .map_err(|e| ManagerError::read(path, e))?
                    .len();
                status.set_bytes(size, size);
                path.clone()
            }
            InstallSource::Remote(url) => {
                status.advance(SessionState::Downloading);
                self.download(url, request, status, cancel)?
            }
        };

        status.advance(SessionState::Extracting);
        let result = self.extract_and_merge(&archive, request, cancel);

        if request.source.is_remote() {
            remove_file_logged(&archive);
        }
        result
    }

    fn download(
        &self,
        url: &str,
        request: &FrameworkInstallRequest,
        status: &Arc<FrameworkStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<PathBuf> {
        fs::create_dir_all(&self.config.staging_dir)
            .map_err(|e| ManagerError::create_dir(&self.config.staging_dir, e))?;

        let file_name = request
            .source
            .file_name()
            .map(|name| sanitize_file_name(&name))
            .unwrap_or_else(|| "framework-download.bin".to_string());
        let dest = self.config.staging_dir.join(file_name);

        // Seed from an existing partial file so a resume starts at its offset.
        if let Ok(meta) = fs::metadata(&dest) {
            status.set_bytes(meta.len(), 0);
        }

        let progress_status = Arc::clone(status);
        let on_progress =
            move |downloaded: u64, total: u64| progress_status.set_bytes(downloaded, total);

        let result =
            self.downloader
                .download_with_progress(url, &dest, cancel, Box::new(on_progress));

        match result {
            Ok(size) => {
                status.set_bytes(size, size);
                Ok(dest)
            }
            Err(e) => {
                if e.is_cancelled() && request.discard_partial_on_cancel {
                    remove_file_logged(&dest);
                }
                Err(e)
            }
        }
    }

    fn extract_and_merge(
        &self,
        archive: &Path,
        request: &FrameworkInstallRequest,
        cancel: &CancellationToken,
    ) -> ManagerResult<FrameworkInstallOutcome> {
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        let scratch = ScratchDir::create_in(&self.config.staging_dir, "extract-")?;
        let extracted = self.extractor.extract(archive, scratch.path(), cancel)?;
        tracing::debug!(files = extracted, scratch = %scratch.path().display(), "Archive extracted");

        let version = request.effective_version_tag();
        let sha256 = match request.record_path {
            Some(_) => Some(calculate_file_checksum(archive)?),
            None => None,
        };

        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        fs::create_dir_all(&request.target_dir)
            .map_err(|e| ManagerError::create_dir(&request.target_dir, e))?;

        let reconciler = PresetsReconciler::new(request.policy, version.clone());
        let plan = reconciler.prepare(scratch.path(), &request.target_dir)?;
        let installed_files = merge_copy(scratch.path(), &request.target_dir, plan.merge_exclusion())?;
        plan.finish()?;
        scratch.cleanup();

        let record = match (&request.record_path, &version) {
            (Some(path), Some(version)) => {
                let source = if request.source.is_remote() {
                    VersionSource::Release
                } else {
                    VersionSource::LocalImport
                };
                let files = installed_files
                    .iter()
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .collect();
                let mut record = FrameworkVersionRecord::new(version.clone(), source).with_files(files);
                if let Some(digest) = sha256 {
                    record = record.with_sha256(digest);
                }
                record.save(path)?;
                Some(record)
            }
            (Some(path), None) => {
                tracing::warn!(
                    path = %path.display(),
                    "No version tag known; version record not written"
                );
                None
            }
            _ => None,
        };

        Ok(FrameworkInstallOutcome {
            version,
            installed_files,
            record,
        })
    }
}

/// Replace characters that cannot appear in a file name.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '<' | '>' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(['.', ' ']).to_string();
    if cleaned.is_empty() {
        "framework-download.bin".to_string()
    } else {
        cleaned
    }
}

fn remove_file_logged(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove archive");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::testing::{write_zip, FixtureDownloader};
    use tempfile::TempDir;

    fn session(staging: &Path, archive: &Path) -> FrameworkInstallSession<FixtureDownloader, NativeExtractor> {
        FrameworkInstallSession::new(
            FixtureDownloader::single(archive),
            NativeExtractor::new(),
            ManagerConfig::new(staging.to_path_buf()),
        )
    }

    fn scratch_dirs(staging: &Path) -> usize {
        fs::read_dir(staging)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.file_name().to_string_lossy().starts_with("extract-"))
                    .count()
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_parse_source() {
        assert_eq!(
            InstallSource::parse("file:///tmp/ReShade.zip"),
            InstallSource::Local(PathBuf::from("/tmp/ReShade.zip"))
        );
        assert_eq!(
            InstallSource::parse("https://example.com/dl/ReShade_Setup_6.3.0.exe"),
            InstallSource::Remote("https://example.com/dl/ReShade_Setup_6.3.0.exe".to_string())
        );
        assert_eq!(
            InstallSource::parse("https://example.com/dl/ReShade_Setup_6.3.0.exe?x=1").file_name(),
            Some("ReShade_Setup_6.3.0.exe".to_string())
        );
    }

    #[test]
    fn test_validation_rejects_before_start() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("a.zip");
        let session = session(&temp.path().join("staging"), &archive);

        let request = FrameworkInstallRequest::new("file:///definitely/missing.zip", temp.path());
        assert!(matches!(session.start(request), Err(ManagerError::Validation(_))));

        let request = FrameworkInstallRequest::new("ftp://example.com/a.zip", temp.path());
        assert!(matches!(session.start(request), Err(ManagerError::Validation(_))));
    }

    #[test]
    fn test_local_install_skips_downloading() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("ReShade_6.3.0.zip");
        write_zip(&archive, &[("dxgi.dll", "bin"), ("Presets/Default.ini", "p")]);
        let staging = temp.path().join("staging");
        let target = temp.path().join("game");

        let session = session(&staging, &archive);
        let request = FrameworkInstallRequest::new(archive.to_str().unwrap(), &target);
        let status = Arc::new(FrameworkStatus::default());
        let outcome = session
            .run(&request, &status, &CancellationToken::new())
            .unwrap();

        let progress = status.snapshot();
        assert_eq!(progress.state, SessionState::Finished);
        assert_eq!(progress.downloaded_bytes, progress.total_bytes);
        assert!(progress.error_message.is_empty());
        assert_eq!(outcome.version.as_deref(), Some("6.3.0"));
        assert!(target.join("dxgi.dll").is_file());
        assert!(archive.exists(), "local archives are never deleted");
        assert_eq!(scratch_dirs(&staging), 0);
    }

    #[test]
    fn test_remote_install_writes_record_and_removes_archive() {
        let temp = TempDir::new().unwrap();
        let fixture = temp.path().join("fixture.zip");
        write_zip(&fixture, &[("dxgi.dll", "bin")]);
        let staging = temp.path().join("staging");
        let target = temp.path().join("game");
        let record_path = temp.path().join("versions/stock.json");

        let session = session(&staging, &fixture);
        let request = FrameworkInstallRequest::new("https://example.com/ReShade.zip", &target)
            .with_version_tag("6.3.0")
            .with_record_path(&record_path);
        let handle = session.start(request).unwrap();
        let outcome = handle.wait().unwrap();

        let record = outcome.record.unwrap();
        assert_eq!(record.source, VersionSource::Release);
        assert_eq!(record.files, Some(vec!["dxgi.dll".to_string()]));
        assert_eq!(record.sha256.as_ref().map(String::len), Some(64));
        assert!(record_path.is_file());
        assert!(!staging.join("ReShade.zip").exists());
        assert_eq!(scratch_dirs(&staging), 0);
    }

    #[test]
    fn test_cancel_before_extraction_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("ReShade.zip");
        write_zip(&archive, &[("dxgi.dll", "new")]);
        let staging = temp.path().join("staging");
        let target = temp.path().join("game");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("dxgi.dll"), "old").unwrap();

        let session = session(&staging, &archive);
        let request = FrameworkInstallRequest::new(archive.to_str().unwrap(), &target);
        let status = Arc::new(FrameworkStatus::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = session.run(&request, &status, &cancel);

        assert!(matches!(result, Err(ManagerError::Cancelled)));
        let progress = status.snapshot();
        assert_eq!(progress.state, SessionState::Cancelled);
        assert!(progress.error_message.is_empty());
        assert_eq!(fs::read_to_string(target.join("dxgi.dll")).unwrap(), "old");
        assert_eq!(scratch_dirs(&staging), 0);
    }

    #[test]
    fn test_corrupt_archive_reports_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, b"PK\x03\x04 definitely not a zip").unwrap();
        let staging = temp.path().join("staging");

        let session = session(&staging, &archive);
        let request =
            FrameworkInstallRequest::new(archive.to_str().unwrap(), temp.path().join("game"));
        let status = Arc::new(FrameworkStatus::default());
        let result = session.run(&request, &status, &CancellationToken::new());

        assert!(result.is_err());
        let progress = status.snapshot();
        assert_eq!(progress.state, SessionState::Error);
        assert!(!progress.error_message.is_empty());
        assert_eq!(scratch_dirs(&staging), 0);
    }

    #[test]
    fn test_progress_serializes_with_wire_codes() {
        let status = FrameworkStatus::default();
        status.advance(SessionState::Downloading);
        status.set_bytes(50, 100);
        let json = serde_json::to_value(status.snapshot()).unwrap();
        assert_eq!(json["state"], 1);
        assert_eq!(json["totalBytes"], 100);
        assert_eq!(json["downloadedBytes"], 50);
    }

    #[test]
    fn test_downloaded_never_exceeds_total() {
        let status = FrameworkStatus::default();
        status.set_bytes(10, 100);
        status.set_bytes(150, 0);
        let progress = status.snapshot();
        assert_eq!(progress.downloaded_bytes, 100);
    }
}
