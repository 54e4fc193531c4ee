//! Integration tests for framework installs and preset handling.
//!
//! These tests run a full install from a local archive into a live
//! directory and check:
//! - Each presets policy against pre-existing user presets
//! - Version records written after an install
//! - Cancellation during extraction leaving no trace
//!
//! Run with: `cargo test --test framework_install`

mod common;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use shadekeeper::manager::{
    ArchiveExtractor, FrameworkInstallRequest, FrameworkInstallSession, FrameworkStatus,
    FrameworkVersionRecord, ManagerConfig, ManagerError, ManagerResult, NativeExtractor,
    PresetsPolicy, SessionState, VersionSource,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{tree, write_file, write_zip, FixtureDownloader};

// ============================================================================
// Helper Functions
// ============================================================================

fn local_source(archive: &Path) -> String {
    format!("file://{}", archive.display())
}

fn install(
    temp: &Path,
    request: FrameworkInstallRequest,
) -> (ManagerResult<()>, SessionState) {
    install_with(temp, NativeExtractor::new(), request)
}

fn install_with<E: ArchiveExtractor + 'static>(
    temp: &Path,
    extractor: E,
    request: FrameworkInstallRequest,
) -> (ManagerResult<()>, SessionState) {
    let session = FrameworkInstallSession::new(
        FixtureDownloader::default(),
        extractor,
        ManagerConfig::new(temp.join("staging")),
    );
    let status = Arc::new(FrameworkStatus::default());
    let result = session
        .run(&request, &status, &CancellationToken::new())
        .map(|_| ());
    (result, status.state())
}

/// Only entries of `tree` below `prefix`, with the prefix stripped.
fn subtree(tree: &BTreeMap<String, String>, prefix: &str) -> BTreeMap<String, String> {
    tree.iter()
        .filter_map(|(k, v)| k.strip_prefix(prefix).map(|k| (k.to_string(), v.clone())))
        .collect()
}

/// A framework archive with presets and shader content.
fn framework_archive(path: &Path) {
    write_zip(
        path,
        &[
            ("ReShade64.dll", "new-dll"),
            ("reshade-shaders/Shaders/Blur.fx", "blur"),
            ("Presets/Default.ini", "archive-default"),
            ("Presets/Cinematic/Warm.ini", "archive-warm"),
        ],
    );
}

/// A live install with user presets.
fn live_install(live: &Path) {
    write_file(&live.join("ReShade64.dll"), "old-dll");
    write_file(&live.join("Presets/Default.ini"), "user-default");
    write_file(&live.join("Presets/Mine.ini"), "user-mine");
    write_file(&live.join("Presets/6.0.0/Old.ini"), "older-version");
}

// ============================================================================
// Presets policies
// ============================================================================

#[test]
fn test_keep_existing_leaves_presets_untouched() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("ReShade_6.3.0.zip");
    let live = temp.path().join("live");
    framework_archive(&archive);
    live_install(&live);
    let presets_before = subtree(&tree(&live), "Presets/");

    let request = FrameworkInstallRequest::new(&local_source(&archive), &live)
        .with_policy(PresetsPolicy::KeepExisting);
    let (result, state) = install(temp.path(), request);
    result.unwrap();

    let after = tree(&live);
    assert_eq!(state, SessionState::Finished);
    assert_eq!(subtree(&after, "Presets/"), presets_before);
    assert_eq!(after["ReShade64.dll"], "new-dll");
    assert_eq!(after["reshade-shaders/Shaders/Blur.fx"], "blur");
    assert!(archive.exists(), "local archives are never deleted");
}

#[test]
fn test_separate_folder_redirects_presets() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("framework.zip");
    let live = temp.path().join("live");
    framework_archive(&archive);
    live_install(&live);

    let request = FrameworkInstallRequest::new(&local_source(&archive), &live)
        .with_policy(PresetsPolicy::SeparateFolder)
        .with_version_tag("6.3/beta:1");
    let (result, _) = install(temp.path(), request);
    result.unwrap();

    let presets = subtree(&tree(&live), "Presets/");
    let expected: BTreeMap<String, String> = [
        ("Default.ini", "user-default"),
        ("Mine.ini", "user-mine"),
        ("6.0.0/Old.ini", "older-version"),
        ("6.3_beta_1/Default.ini", "archive-default"),
        ("6.3_beta_1/Cinematic/Warm.ini", "archive-warm"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    assert_eq!(presets, expected);
}

#[test]
fn test_overwrite_replaces_archive_presets_only() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("framework.zip");
    let live = temp.path().join("live");
    framework_archive(&archive);
    live_install(&live);

    let request = FrameworkInstallRequest::new(&local_source(&archive), &live);
    let (result, _) = install(temp.path(), request);
    result.unwrap();

    let presets = subtree(&tree(&live), "Presets/");
    assert_eq!(presets["Default.ini"], "archive-default");
    assert_eq!(presets["Cinematic/Warm.ini"], "archive-warm");
    assert_eq!(presets["Mine.ini"], "user-mine");
    assert_eq!(presets["6.0.0/Old.ini"], "older-version");
}

fn preset_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,6}", 0..5)
        .prop_map(|names| names.into_iter().map(|n| format!("{}.ini", n)).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Whatever the archive brings, `KeepExisting` leaves the live presets
    /// exactly as they were while the rest of the archive lands.
    #[test]
    fn prop_keep_existing_preserves_file_set(
        existing in preset_names(),
        incoming in preset_names(),
    ) {
        let temp = TempDir::new().unwrap();
        let live = temp.path().join("live");
        fs::create_dir_all(&live).unwrap();
        for name in &existing {
            write_file(&live.join("Presets").join(name), &format!("user-{}", name));
        }
        let before = tree(&live);

        let mut entries: Vec<(String, String)> = incoming
            .iter()
            .map(|n| (format!("Presets/{}", n), format!("archive-{}", n)))
            .collect();
        entries.push(("Shaders/Core.fx".to_string(), "core".to_string()));
        let borrowed: Vec<(&str, &str)> =
            entries.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        let archive = temp.path().join("framework.zip");
        write_zip(&archive, &borrowed);

        let request = FrameworkInstallRequest::new(&local_source(&archive), &live)
            .with_policy(PresetsPolicy::KeepExisting);
        let (result, _) = install(temp.path(), request);
        prop_assert!(result.is_ok());

        let after = tree(&live);
        prop_assert_eq!(subtree(&after, "Presets/"), subtree(&before, "Presets/"));
        prop_assert_eq!(after.get("Shaders/Core.fx").map(String::as_str), Some("core"));
    }
}

// ============================================================================
// Version records
// ============================================================================

#[test]
fn test_local_import_infers_version_and_records_it() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("ReShade_Setup_6.3.0.zip");
    let live = temp.path().join("live");
    let record_path = temp.path().join("versions/stock.json");
    framework_archive(&archive);

    let request = FrameworkInstallRequest::new(&local_source(&archive), &live)
        .with_policy(PresetsPolicy::SeparateFolder)
        .with_record_path(&record_path);
    let (result, _) = install(temp.path(), request);
    result.unwrap();

    assert!(live.join("Presets/6.3.0/Default.ini").is_file());

    let record = FrameworkVersionRecord::load(&record_path).unwrap().unwrap();
    assert_eq!(record.version, "6.3.0");
    assert_eq!(record.source, VersionSource::LocalImport);
    assert_eq!(record.sha256.as_deref().map(str::len), Some(64));
    assert!(record
        .files
        .as_ref()
        .unwrap()
        .contains(&"reshade-shaders/Shaders/Blur.fx".to_string()));
    assert!(record.is_outdated_by("6.4.0"));
}

// ============================================================================
// Cancellation
// ============================================================================

/// Extracts everything, then reports cancellation as if it arrived mid-way.
struct CancellingExtractor {
    inner: NativeExtractor,
    token: CancellationToken,
}

impl ArchiveExtractor for CancellingExtractor {
    fn extract(
        &self,
        archive: &Path,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> ManagerResult<usize> {
        self.inner.extract(archive, dest, cancel)?;
        self.token.cancel();
        Err(ManagerError::Cancelled)
    }
}

#[test]
fn test_cancel_during_extraction_leaves_no_trace() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("framework.zip");
    let live = temp.path().join("live");
    framework_archive(&archive);
    live_install(&live);
    let before = tree(&live);

    let cancel = CancellationToken::new();
    let session = FrameworkInstallSession::new(
        FixtureDownloader::default(),
        CancellingExtractor {
            inner: NativeExtractor::new(),
            token: cancel.clone(),
        },
        ManagerConfig::new(temp.path().join("staging")),
    );
    let status = Arc::new(FrameworkStatus::default());
    let request = FrameworkInstallRequest::new(&local_source(&archive), &live);
    let result = session.run(&request, &status, &cancel);

    assert!(matches!(result, Err(ManagerError::Cancelled)));
    let progress = status.snapshot();
    assert_eq!(progress.state, SessionState::Cancelled);
    assert!(progress.error_message.is_empty());
    assert_eq!(tree(&live), before);

    let leftovers: Vec<_> = fs::read_dir(temp.path().join("staging"))
        .map(|entries| entries.filter_map(Result::ok).collect())
        .unwrap_or_default();
    assert!(leftovers.is_empty(), "scratch left behind: {:?}", leftovers);
}

#[test]
fn test_remote_install_through_background_handle() {
    let temp = TempDir::new().unwrap();
    let archive = temp.path().join("fixture.zip");
    let live = temp.path().join("live");
    framework_archive(&archive);

    let url = "https://releases.test/ReShade_6.3.0.zip";
    let session = FrameworkInstallSession::new(
        FixtureDownloader::default().with(url, &archive),
        NativeExtractor::new(),
        ManagerConfig::new(temp.path().join("staging")),
    );
    let handle = session
        .start(FrameworkInstallRequest::new(url, &live).with_version_tag("6.3.0"))
        .unwrap();
    let status = handle.status();
    let outcome = handle.wait().unwrap();

    assert_eq!(outcome.version.as_deref(), Some("6.3.0"));
    assert_eq!(status.state(), SessionState::Finished);
    assert_eq!(fs::read_to_string(live.join("ReShade64.dll")).unwrap(), "new-dll");
    assert!(!temp.path().join("staging/ReShade_6.3.0.zip").exists());
}
