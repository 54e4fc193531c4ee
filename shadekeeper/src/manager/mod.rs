//! Framework installation engine.
//!
//! This module installs and updates a framework release into a live install
//! directory.
//!
//! # Overview
//!
//! - **Download**: resumable single-file HTTP fetcher (`download`)
//! - **Extraction**: ZIP / 7z / tar.gz extraction into scratch directories
//! - **Presets**: reconciliation of the user-owned `Presets` subtree
//! - **Merge**: policy-unaware recursive copy into the live tree
//! - **Framework session**: the orchestrator tying the above together
//! - **Version record**: what was installed, for update checks
//!
//! # Install Flow
//!
//! ```text
//! source ──► download ──► extract ──► presets pre-pass ──► merge ──► presets post-pass
//!  (URL)      (staging)    (scratch)    (scratch tree)      (live)     (live/Presets)
//! ```
//!
//! Sessions take their collaborators through the [`PackageDownloader`] and
//! [`ArchiveExtractor`] traits.

mod config;
pub mod download;
mod error;
mod extractor;
mod framework;
mod merge;
mod presets;
mod state;
mod traits;
mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ManagerConfig, DEFAULT_PROGRESS_INTERVAL};
pub use error::{ManagerError, ManagerResult};
pub use extractor::{ArchiveKind, NativeExtractor, ScratchDir};
pub use framework::{
    FrameworkInstallHandle, FrameworkInstallOutcome, FrameworkInstallRequest,
    FrameworkInstallSession, FrameworkProgress, FrameworkStatus, InstallSource, LOCAL_FILE_MARKER,
};
pub use merge::{copy_dir_recursive, merge_copy};
pub use presets::{
    find_child_dir_ignore_case, sanitize_version_tag, PresetsPolicy, PresetsReconciler,
    PresetsSnapshot, ReconcilePlan, PRESETS_DIR_NAME, VERSION_PLACEHOLDER,
};
pub use state::SessionState;
pub(crate) use state::StateCell;
pub use traits::{ArchiveExtractor, PackageDownloader, ProgressCallback};
pub use version::{infer_version_from_filename, FrameworkVersionRecord, VersionSource};
