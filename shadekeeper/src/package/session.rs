//! Package install session.
//!
//! Installs a selection of effect packages and add-ons into one or more
//! framework directories. One unit of work is one (package or add-on, target
//! directory) pair; units run strictly one after another on the session's
//! worker. A unit without a download URL is skipped and a unit that fails
//! is recorded; neither stops the session.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::{Serialize, Serializer};
use tokio_util::sync::CancellationToken;

use crate::catalog::{
    select, Addon, Catalog, CatalogSelection, EffectPackage, InstallMode, Mirror, ADDON_PATH,
    DEFAULT_TEXTURE_PATH,
};
use crate::manager::download::{HttpDownloader, ThroughputMeter};
use crate::manager::{
    ArchiveExtractor, ManagerConfig, ManagerError, ManagerResult, NativeExtractor,
    PackageDownloader, ScratchDir, SessionState, StateCell,
};

use super::locate::{
    copy_matching, find_addon_binary, is_addon_binary, is_shader_source, is_texture,
    locate_shaders, locate_textures, normalized_addon_file_name,
};
use super::search_paths::write_search_paths;
use super::target::InstallTarget;

/// What kind of unit is being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileKind {
    #[default]
    Shader,
    Addon,
}

impl FileKind {
    /// Wire-level integer code.
    pub fn code(self) -> u8 {
        match self {
            Self::Shader => 0,
            Self::Addon => 1,
        }
    }
}

impl Serialize for FileKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A request to install a package set.
#[derive(Debug, Clone)]
pub struct PackageInstallRequest {
    pub base_path: PathBuf,
    pub target: InstallTarget,
    pub selection: CatalogSelection,
    pub mirror: Mirror,
}

impl PackageInstallRequest {
    /// Create a request for an explicit selection.
    pub fn new(base_path: impl Into<PathBuf>, target: InstallTarget, selection: CatalogSelection) -> Self {
        Self {
            base_path: base_path.into(),
            target,
            selection,
            mirror: Mirror::Direct,
        }
    }

    /// Create a request by selecting from `catalog`.
    pub fn from_catalog<S: AsRef<str>>(
        catalog: &Catalog,
        base_path: impl Into<PathBuf>,
        target: InstallTarget,
        mode: InstallMode,
        custom_names: &[S],
    ) -> Self {
        Self::new(base_path, target, select(catalog, mode, custom_names))
    }

    /// Route downloads through `mirror`.
    pub fn with_mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = mirror;
        self
    }

    /// Restrict the named packages to the listed effect files.
    pub fn with_file_selection(mut self, files: &HashMap<String, Vec<String>>) -> Self {
        self.selection.apply_file_selection(files);
        self
    }

    /// Target directories this request writes into.
    pub fn target_dirs(&self) -> Vec<PathBuf> {
        self.target.directories(&self.base_path)
    }

    /// Reject requests that cannot do anything before work starts.
    pub fn validate(&self) -> ManagerResult<()> {
        if self.base_path.as_os_str().is_empty() {
            return Err(ManagerError::Validation(
                "base path must not be empty".to_string(),
            ));
        }
        if self.selection.is_empty() {
            return Err(ManagerError::Validation(
                "no packages or add-ons selected".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of a package session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageProgress {
    pub state: SessionState,
    pub total_files: u64,
    pub downloaded_files: u64,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    pub current_file: String,
    pub current_file_kind: FileKind,
    #[serde(rename = "downloadSpeedBytesPerSec")]
    pub download_speed: u64,
    pub error_message: String,
}

/// Live counters of a package session, written by its worker only.
#[derive(Debug, Default)]
pub struct PackageStatus {
    state: StateCell,
    total_files: AtomicU64,
    downloaded_files: AtomicU64,
    total_bytes: AtomicU64,
    downloaded_bytes: AtomicU64,
    transferred: AtomicU64,
    download_speed: AtomicU64,
    current: Mutex<(String, FileKind)>,
    error_message: Mutex<String>,
}

impl PackageStatus {
    /// Take a snapshot.
    pub fn snapshot(&self) -> PackageProgress {
        let (current_file, current_file_kind) = self.current.lock().clone();
        PackageProgress {
            state: self.state.get(),
            total_files: self.total_files.load(Ordering::Relaxed),
            downloaded_files: self.downloaded_files.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            downloaded_bytes: self.downloaded_bytes.load(Ordering::Relaxed),
            current_file,
            current_file_kind,
            download_speed: self.download_speed.load(Ordering::Relaxed),
            error_message: self.error_message.lock().clone(),
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    fn advance(&self, state: SessionState) {
        if self.state.advance(state) {
            tracing::debug!(state = state.name(), "Package session state");
        }
    }

    fn begin_unit(&self, name: &str, kind: FileKind) {
        *self.current.lock() = (name.to_string(), kind);
        self.total_bytes.store(0, Ordering::Relaxed);
        self.downloaded_bytes.store(0, Ordering::Relaxed);
    }

    fn finish_unit(&self) {
        self.downloaded_files.fetch_add(1, Ordering::Relaxed);
    }

    fn set_bytes(&self, downloaded: u64, total: u64) {
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

/// Outcome of one unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum UnitOutcome {
    Installed,
    /// No download URL.
    Skipped,
    Failed(String),
}

/// Record of one processed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub name: String,
    pub kind: FileKind,
    pub target_dir: PathBuf,
    #[serde(flatten)]
    pub outcome: UnitOutcome,
}

/// Per-unit results of a package session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageInstallReport {
    pub units: Vec<UnitReport>,
}

impl PackageInstallReport {
    /// Units installed successfully.
    pub fn installed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Installed))
    }

    /// Units skipped for lack of a download URL.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Skipped))
    }

    /// Units that failed.
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, UnitOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&UnitOutcome) -> bool) -> usize {
        self.units.iter().filter(|u| pred(&u.outcome)).count()
    }
}

/// Handle to a package install running on a background thread.
pub struct PackageInstallHandle {
    status: Arc<PackageStatus>,
    cancellation: CancellationToken,
    thread: Option<JoinHandle<ManagerResult<PackageInstallReport>>>,
}

impl PackageInstallHandle {
    /// Current progress snapshot.
    pub fn progress(&self) -> PackageProgress {
        self.status.snapshot()
    }

    /// Shared status, for progress bridges.
    pub fn status(&self) -> Arc<PackageStatus> {
        Arc::clone(&self.status)
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        tracing::info!("Package install cancellation requested");
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

    /// Block until the worker stops and return its report.
    pub fn wait(mut self) -> ManagerResult<PackageInstallReport> {
        match self.thread.take() {
            Some(thread) => thread.join().unwrap_or_else(|_| {
                Err(ManagerError::Validation(
                    "package install worker panicked".to_string(),
                ))
            }),
            None => Err(ManagerError::Validation(
                "package install already awaited".to_string(),
            )),
        }
    }
}

/// Installs effect packages and add-ons.
pub struct PackageInstallSession<D = HttpDownloader, E = NativeExtractor> {
    downloader: Arc<D>,
    extractor: Arc<E>,
    config: ManagerConfig,
}

impl PackageInstallSession<HttpDownloader, NativeExtractor> {
    /// Create a session using HTTP downloads and the native extractor.
    pub fn with_config(config: ManagerConfig) -> Self {
        let downloader = HttpDownloader::with_timeout(config.timeout);
        Self::new(downloader, NativeExtractor::new(), config)
    }
}

impl<D, E> PackageInstallSession<D, E>
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
    pub fn start(&self, request: PackageInstallRequest) -> ManagerResult<PackageInstallHandle> {
        request.validate()?;

        let status = Arc::new(PackageStatus::default());
        let cancellation = CancellationToken::new();

        let worker = PackageInstallSession {
            downloader: Arc::clone(&self.downloader),
            extractor: Arc::clone(&self.extractor),
            config: self.config.clone(),
        };
        let worker_status = Arc::clone(&status);
        let worker_cancel = cancellation.clone();

        let thread = thread::Builder::new()
            .name("package-install".to_string())
            .spawn(move || worker.run(&request, &worker_status, &worker_cancel))
            .map_err(|e| ManagerError::Validation(format!("cannot start worker: {}", e)))?;

        Ok(PackageInstallHandle {
            status,
            cancellation,
            thread: Some(thread),
        })
    }

    /// Run `request` on the current thread, updating `status` as it goes.
    pub fn run(
        &self,
        request: &PackageInstallRequest,
        status: &Arc<PackageStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<PackageInstallReport> {
        if let Err(e) = request.validate() {
            status.fail(&e);
            return Err(e);
        }

        let target_dirs = request.target_dirs();
        let total = (request.selection.len() * target_dirs.len()) as u64;
        status.total_files.store(total, Ordering::Relaxed);
        status.advance(SessionState::Downloading);

        tracing::info!(
            packages = request.selection.packages.len(),
            addons = request.selection.addons.len(),
            targets = target_dirs.len(),
            "Starting package install"
        );

        let sample_status = Arc::clone(status);
        let publish_status = Arc::clone(status);
        let meter = ThroughputMeter::start_default(
            move || sample_status.transferred.load(Ordering::Relaxed),
            move |delta| publish_status.download_speed.store(delta, Ordering::Relaxed),
        );

        let result = self.install_all(request, &target_dirs, status, cancel);
        meter.stop();

        match &result {
            Ok(report) => {
                status.advance(SessionState::Finished);
                tracing::info!(
                    installed = report.installed(),
                    skipped = report.skipped(),
                    failed = report.failed(),
                    "Package install finished"
                );
            }
            Err(e) if e.is_cancelled() => {
                status.fail(e);
                tracing::info!("Package install cancelled");
            }
            Err(e) => {
                status.fail(e);
                tracing::error!(error = %e, "Package install failed");
            }
        }
        result
    }

    fn install_all(
        &self,
        request: &PackageInstallRequest,
        target_dirs: &[PathBuf],
        status: &Arc<PackageStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<PackageInstallReport> {
        let mut report = PackageInstallReport::default();

        for target_dir in target_dirs {
            for package in &request.selection.packages {
                status.begin_unit(&package.name, FileKind::Shader);
                let outcome = self.unit_outcome(
                    &package.name,
                    &package.download_url,
                    |url| self.install_package(package, url, target_dir, status, cancel),
                    request,
                )?;
                report.units.push(UnitReport {
                    name: package.name.clone(),
                    kind: FileKind::Shader,
                    target_dir: target_dir.clone(),
                    outcome,
                });
                status.finish_unit();
            }

            for addon in &request.selection.addons {
                status.begin_unit(&addon.name, FileKind::Addon);
                let outcome = self.unit_outcome(
                    &addon.name,
                    &addon.download_url,
                    |url| self.install_addon(addon, url, target_dir, status, cancel),
                    request,
                )?;
                report.units.push(UnitReport {
                    name: addon.name.clone(),
                    kind: FileKind::Addon,
                    target_dir: target_dir.clone(),
                    outcome,
                });
                status.finish_unit();
            }

            if cancel.is_cancelled() {
                return Err(ManagerError::Cancelled);
            }
            write_search_paths(target_dir)?;
        }

        Ok(report)
    }

    /// Run one unit, turning unit-level failures into a recorded outcome.
    ///
    /// Cancellation is propagated.
    fn unit_outcome(
        &self,
        name: &str,
        download_url: &str,
        install: impl FnOnce(&str) -> ManagerResult<()>,
        request: &PackageInstallRequest,
    ) -> ManagerResult<UnitOutcome> {
        if download_url.trim().is_empty() {
            tracing::info!(name = %name, "No download URL; skipping");
            return Ok(UnitOutcome::Skipped);
        }

        let url = request.mirror.apply(download_url.trim());
        match install(&url) {
            Ok(()) => Ok(UnitOutcome::Installed),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                tracing::warn!(name = %name, error = %e, "Unit failed; continuing");
                Ok(UnitOutcome::Failed(e.user_message()))
            }
        }
    }

    fn install_package(
        &self,
        package: &EffectPackage,
        url: &str,
        target_dir: &Path,
        status: &Arc<PackageStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        let file_name = url_file_name(url).unwrap_or_else(|| "package.download".to_string());
        let archive = self.download(url, &file_name, status, cancel)?;
        let result = self.extract_and_install_package(package, &archive, target_dir, cancel);
        remove_file_logged(&archive);
        result
    }

    fn extract_and_install_package(
        &self,
        package: &EffectPackage,
        archive: &Path,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        let scratch = ScratchDir::create_in(&self.config.staging_dir, "package-")?;
        self.extractor.extract(archive, scratch.path(), cancel)?;
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        let shaders = locate_shaders(scratch.path());
        let textures = locate_textures(scratch.path());
        if shaders.is_none() && textures.is_none() {
            return Err(ManagerError::ExtractionFailed {
                path: archive.to_path_buf(),
                reason: format!("no shader or texture files in package '{}'", package.name),
            });
        }

        if let Some(shaders) = &shaders {
            let by_name = shaders.by_name;
            let copied = copy_matching(&shaders.dir, &target_dir.join(package.shader_dir()), |p| {
                let allowed = p
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| package.allows_file(n));
                allowed && (by_name || is_shader_source(p))
            })?;
            tracing::debug!(package = %package.name, files = copied, "Installed shaders");
        }

        if let Some(textures) = &textures {
            let by_name = textures.by_name;
            let copied =
                copy_matching(&textures.dir, &target_dir.join(package.texture_dir()), |p| {
                    by_name || is_texture(p)
                })?;
            tracing::debug!(package = %package.name, files = copied, "Installed textures");
        }

        scratch.cleanup();
        Ok(())
    }

    fn install_addon(
        &self,
        addon: &Addon,
        url: &str,
        target_dir: &Path,
        status: &Arc<PackageStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        let file_name = url_file_name(url).unwrap_or_else(|| "addon.download".to_string());
        let download = self.download(url, &file_name, status, cancel)?;
        let result = self.place_addon(addon, &download, target_dir, cancel);
        remove_file_logged(&download);
        result
    }

    fn place_addon(
        &self,
        addon: &Addon,
        download: &Path,
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<()> {
        let addons_dir = target_dir.join(ADDON_PATH);
        fs::create_dir_all(&addons_dir).map_err(|e| ManagerError::create_dir(&addons_dir, e))?;

        if is_addon_binary(download) {
            let dest = addons_dir.join(normalized_addon_file_name(download, &addon.name));
            fs::copy(download, &dest).map_err(|e| ManagerError::write(&dest, e))?;
            tracing::debug!(addon = %addon.name, dest = %dest.display(), "Installed add-on");
            return Ok(());
        }

        let scratch = ScratchDir::create_in(&self.config.staging_dir, "addon-")?;
        self.extractor.extract(download, scratch.path(), cancel)?;
        if cancel.is_cancelled() {
            return Err(ManagerError::Cancelled);
        }

        let binary = find_addon_binary(scratch.path()).ok_or_else(|| {
            ManagerError::AddonBinaryMissing {
                addon: addon.name.clone(),
            }
        })?;
        let dest = addons_dir.join(normalized_addon_file_name(&binary, &addon.name));
        fs::copy(&binary, &dest).map_err(|e| ManagerError::write(&dest, e))?;
        tracing::debug!(addon = %addon.name, dest = %dest.display(), "Installed add-on");

        if let Some(shaders) = locate_shaders(scratch.path()) {
            let by_name = shaders.by_name;
            copy_matching(&shaders.dir, &target_dir.join(addon.effect_dir()), |p| {
                by_name || is_shader_source(p)
            })?;
        }
        if let Some(textures) = locate_textures(scratch.path()) {
            let by_name = textures.by_name;
            copy_matching(&textures.dir, &target_dir.join(DEFAULT_TEXTURE_PATH), |p| {
                by_name || is_texture(p)
            })?;
        }

        scratch.cleanup();
        Ok(())
    }

    /// Download `url` to a fixed staging file, counting bytes for throughput.
    fn download(
        &self,
        url: &str,
        file_name: &str,
        status: &Arc<PackageStatus>,
        cancel: &CancellationToken,
    ) -> ManagerResult<PathBuf> {
        let dir = self.config.staging_dir.join("downloads");
        fs::create_dir_all(&dir).map_err(|e| ManagerError::create_dir(&dir, e))?;
        let dest = dir.join(file_name);

        let seeded = fs::metadata(&dest).map(|m| m.len()).unwrap_or(0);
        status.set_bytes(seeded, 0);

        let progress_status = Arc::clone(status);
        let last = AtomicU64::new(seeded);
        let on_progress = move |downloaded: u64, total: u64| {
            let previous = last.swap(downloaded, Ordering::Relaxed);
            progress_status
                .transferred
                .fetch_add(downloaded.saturating_sub(previous), Ordering::Relaxed);
            progress_status.set_bytes(downloaded, total);
        };

        tracing::debug!(url = %url, dest = %dest.display(), "Downloading");
        match self
            .downloader
            .download_with_progress(url, &dest, cancel, Box::new(on_progress))
        {
            Ok(size) => {
                status.set_bytes(size, size);
                Ok(dest)
            }
            Err(e) => {
                remove_file_logged(&dest);
                Err(e)
            }
        }
    }
}

/// Last path segment of a URL, made safe as a file name.
fn url_file_name(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let name = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn remove_file_logged(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove download");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{EffectFile, Selection};
    use crate::manager::testing::{write_zip, FixtureDownloader};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn package(name: &str, url: &str) -> EffectPackage {
        EffectPackage {
            name: name.to_string(),
            description: String::new(),
            selected: Selection::All,
            modifiable: true,
            install_path: None,
            texture_install_path: None,
            download_url: url.to_string(),
            repository_url: String::new(),
            effect_files: Vec::new(),
            deny_effect_files: BTreeSet::new(),
        }
    }

    fn addon(name: &str, url: &str) -> Addon {
        Addon {
            name: name.to_string(),
            description: String::new(),
            effect_install_path: None,
            download_url: url.to_string(),
            repository_url: String::new(),
        }
    }

    fn run(
        downloader: FixtureDownloader,
        staging: &Path,
        request: &PackageInstallRequest,
    ) -> (ManagerResult<PackageInstallReport>, PackageProgress) {
        let session = PackageInstallSession::new(
            downloader,
            NativeExtractor::new(),
            ManagerConfig::new(staging.to_path_buf()),
        );
        let status = Arc::new(PackageStatus::default());
        let result = session.run(request, &status, &CancellationToken::new());
        (result, status.snapshot())
    }

    #[test]
    fn test_partial_package_installs_only_selected_files() {
        let temp = TempDir::new().unwrap();
        let fixture = temp.path().join("pkg.zip");
        write_zip(
            &fixture,
            &[
                ("repo/Shaders/a.fx", "a"),
                ("repo/Shaders/b.fx", "b"),
                ("repo/Shaders/c.fx", "c"),
                ("repo/Textures/t.png", "t"),
            ],
        );

        let mut pkg = package("Filtered", "https://x.test/pkg.zip");
        pkg.deny_effect_files.insert("b.fx".to_string());
        pkg.effect_files = vec![
            EffectFile { file_name: "a.fx".to_string(), selected: true },
            EffectFile { file_name: "b.fx".to_string(), selected: false },
            EffectFile { file_name: "c.fx".to_string(), selected: false },
        ];
        pkg.selected = Selection::Partial;

        let selection = CatalogSelection { packages: vec![pkg], addons: Vec::new() };
        let base = temp.path().join("games");
        let request = PackageInstallRequest::new(&base, InstallTarget::Stock, selection);
        let (result, progress) =
            run(FixtureDownloader::single(&fixture), &temp.path().join("staging"), &request);

        let report = result.unwrap();
        assert_eq!(report.installed(), 1);
        let shaders = base.join("ReShade/reshade-shaders/Shaders");
        let installed: Vec<String> = fs::read_dir(&shaders)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(installed, vec!["a.fx".to_string()]);
        assert!(base.join("ReShade/reshade-shaders/Textures/t.png").is_file());
        assert!(base.join("ReShade/ReShade.ini").is_file());
        assert_eq!(progress.state, SessionState::Finished);
        assert_eq!(progress.total_files, 1);
        assert_eq!(progress.downloaded_files, 1);
    }

    #[test]
    fn test_empty_url_is_skipped_and_failures_continue() {
        let temp = TempDir::new().unwrap();
        let good = temp.path().join("good.zip");
        write_zip(&good, &[("Shaders/g.fx", "g")]);
        let no_binary = temp.path().join("nobin.zip");
        write_zip(&no_binary, &[("readme.txt", "nothing here")]);

        let downloader = FixtureDownloader::default()
            .with("https://x.test/good.zip", &good)
            .with("https://x.test/nobin.zip", &no_binary);
        let selection = CatalogSelection {
            packages: vec![package("NoUrl", ""), package("Good", "https://x.test/good.zip")],
            addons: vec![addon("Broken", "https://x.test/nobin.zip")],
        };
        let base = temp.path().join("games");
        let request = PackageInstallRequest::new(&base, InstallTarget::Both, selection);
        let (result, progress) = run(downloader, &temp.path().join("staging"), &request);

        let report = result.unwrap();
        assert_eq!(report.units.len(), 6);
        assert_eq!(report.installed(), 2);
        assert_eq!(report.skipped(), 2);
        assert_eq!(report.failed(), 2);
        assert_eq!(progress.total_files, 6);
        assert_eq!(progress.downloaded_files, 6);
        assert_eq!(progress.state, SessionState::Finished);
        assert!(base.join("OpenReShade/reshade-shaders/Shaders/g.fx").is_file());
    }

    #[test]
    fn test_addon_archive_installs_binary_and_effects() {
        let temp = TempDir::new().unwrap();
        let fixture = temp.path().join("addon.zip");
        write_zip(
            &fixture,
            &[
                ("x86/tool.addon32", "32"),
                ("x64/tool.addon64", "64"),
                ("Shaders/tool.fx", "fx"),
            ],
        );

        let selection = CatalogSelection {
            packages: Vec::new(),
            addons: vec![addon("Tool", "https://x.test/addon.zip")],
        };
        let base = temp.path().join("games");
        let request = PackageInstallRequest::new(&base, InstallTarget::Stock, selection);
        let (result, _) =
            run(FixtureDownloader::single(&fixture), &temp.path().join("staging"), &request);

        assert_eq!(result.unwrap().installed(), 1);
        let binary = base.join("ReShade/reshade-shaders/Addons/tool.addon64");
        assert_eq!(fs::read_to_string(binary).unwrap(), "64");
        assert!(base.join("ReShade/reshade-shaders/Shaders/tool.fx").is_file());
    }

    #[test]
    fn test_plain_binary_download_is_copied() {
        let temp = TempDir::new().unwrap();
        let fixture = temp.path().join("fixture.bin");
        fs::write(&fixture, "binary").unwrap();

        let selection = CatalogSelection {
            packages: Vec::new(),
            addons: vec![addon("Plain", "https://x.test/dl/Plain_x64.addon")],
        };
        let base = temp.path().join("games");
        let request = PackageInstallRequest::new(&base, InstallTarget::Stock, selection);
        let (result, _) =
            run(FixtureDownloader::single(&fixture), &temp.path().join("staging"), &request);

        assert_eq!(result.unwrap().installed(), 1);
        assert!(base.join("ReShade/reshade-shaders/Addons/Plain.addon64").is_file());
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let temp = TempDir::new().unwrap();
        let session = PackageInstallSession::new(
            FixtureDownloader::default(),
            NativeExtractor::new(),
            ManagerConfig::new(temp.path().to_path_buf()),
        );
        let request =
            PackageInstallRequest::new(temp.path(), InstallTarget::Both, CatalogSelection::default());
        assert!(matches!(session.start(request), Err(ManagerError::Validation(_))));
    }

    #[test]
    fn test_mirror_rewrites_download_urls() {
        let temp = TempDir::new().unwrap();
        let fixture = temp.path().join("pkg.zip");
        write_zip(&fixture, &[("Shaders/m.fx", "m")]);

        let downloader = FixtureDownloader::default()
            .with("https://proxy.test/https://x.test/pkg.zip", &fixture);
        let selection = CatalogSelection {
            packages: vec![package("Mirrored", "https://x.test/pkg.zip")],
            addons: Vec::new(),
        };
        let request = PackageInstallRequest::new(temp.path().join("games"), InstallTarget::Stock, selection)
            .with_mirror(Mirror::Proxy("https://proxy.test/".to_string()));
        let (result, _) = run(downloader, &temp.path().join("staging"), &request);

        assert_eq!(result.unwrap().installed(), 1);
    }

    #[test]
    fn test_progress_serializes_with_wire_names() {
        let status = PackageStatus::default();
        status.begin_unit("Tool", FileKind::Addon);
        let json = serde_json::to_value(status.snapshot()).unwrap();
        assert_eq!(json["state"], 0);
        assert_eq!(json["currentFileKind"], 1);
        assert_eq!(json["currentFile"], "Tool");
        assert!(json.get("downloadSpeedBytesPerSec").is_some());
    }

    #[test]
    fn test_url_file_name() {
        assert_eq!(
            url_file_name("https://x.test/a/b/Depth%203D.addon64?raw=1"),
            Some("Depth_203D.addon64".to_string())
        );
        assert_eq!(url_file_name("https://x.test/"), None);
    }
}
