//! Reconciliation of the user-customizable `Presets` subtree.
//!
//! Installing a framework archive over an existing install must not destroy
//! presets the user has edited, yet new releases ship new default presets.
//! The reconciler runs in two phases around the generic merge-copy:
//!
//! 1. [`PresetsReconciler::prepare`] snapshots the live `Presets` tree and
//!    rewrites the *scratch* tree according to the policy (leave, delete, or
//!    redirect into a version-scoped folder).
//! 2. [`ReconcilePlan::finish`] runs after the merge-copy and, for
//!    [`PresetsPolicy::KeepExisting`], removes anything the merge introduced
//!    into the live `Presets` tree.
//!
//! For `KeepExisting` the merge-copy is additionally told to stay out of the
//! live `Presets` directory (see [`ReconcilePlan::merge_exclusion`]). The
//! three mechanisms overlap.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{ManagerError, ManagerResult};
use super::merge::copy_dir_recursive;

/// Name of the presets directory at the top of an install.
pub const PRESETS_DIR_NAME: &str = "Presets";

/// Folder name used when a version tag sanitizes to nothing.
pub const VERSION_PLACEHOLDER: &str = "Version";

/// How to treat the archive's `Presets` subtree when merging into a live
/// install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetsPolicy {
    /// Blend archive presets into the live tree, replacing same-named files.
    #[default]
    Overwrite,
    /// Leave the live presets exactly as they are.
    KeepExisting,
    /// Install archive presets into `Presets/<version>/`.
    SeparateFolder,
}

impl PresetsPolicy {
    /// Wire-level integer code.
    pub fn code(self) -> u8 {
        match self {
            Self::Overwrite => 0,
            Self::KeepExisting => 1,
            Self::SeparateFolder => 2,
        }
    }

    /// Parse a wire-level integer code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Overwrite),
            1 => Some(Self::KeepExisting),
            2 => Some(Self::SeparateFolder),
            _ => None,
        }
    }
}

impl FromStr for PresetsPolicy {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" | "0" => Ok(Self::Overwrite),
            "keep" | "keep-existing" | "keep_existing" | "1" => Ok(Self::KeepExisting),
            "separate" | "separate-folder" | "separate_folder" | "2" => Ok(Self::SeparateFolder),
            other => Err(ManagerError::Validation(format!(
                "unknown presets policy '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for PresetsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overwrite => write!(f, "overwrite"),
            Self::KeepExisting => write!(f, "keep-existing"),
            Self::SeparateFolder => write!(f, "separate-folder"),
        }
    }
}

fn is_illegal_dir_char(c: char) -> bool {
    matches!(c, '/' | '\\' | ':' | '<' | '>' | '"' | '|' | '?' | '*') || c.is_control()
}

/// Turn a version tag into a name usable as a single directory component.
///
/// Path separators, colons and characters illegal in Windows directory
/// names become `_`; trailing dots and spaces are trimmed. A tag with no
/// usable character left yields [`VERSION_PLACEHOLDER`].
pub fn sanitize_version_tag(tag: &str) -> String {
    let has_usable = tag
        .chars()
        .any(|c| !is_illegal_dir_char(c) && c != '.' && !c.is_whitespace());
    if !has_usable {
        return VERSION_PLACEHOLDER.to_string();
    }

    let replaced: String = tag
        .chars()
        .map(|c| if is_illegal_dir_char(c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim_end_matches(['.', ' ']);

    if trimmed.is_empty() {
        VERSION_PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Relative file and directory paths under a live `Presets` directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetsSnapshot {
    existed: bool,
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl PresetsSnapshot {
    /// Capture the current state of `presets_dir`.
    pub fn capture(presets_dir: &Path) -> ManagerResult<Self> {
        if !presets_dir.is_dir() {
            return Ok(Self::default());
        }
        let mut snapshot = Self {
            existed: true,
            ..Default::default()
        };
        collect_tree(presets_dir, presets_dir, &mut snapshot.files, &mut snapshot.dirs)?;
        Ok(snapshot)
    }

    /// Whether the directory existed when captured.
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Relative file paths present when captured.
    pub fn files(&self) -> &BTreeSet<PathBuf> {
        &self.files
    }
}

fn collect_tree(
    root: &Path,
    dir: &Path,
    files: &mut BTreeSet<PathBuf>,
    dirs: &mut BTreeSet<PathBuf>,
) -> ManagerResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| ManagerError::read(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ManagerError::read(dir, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| ManagerError::read(&path, e))?;
        let relative = match path.strip_prefix(root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => continue,
        };

        if file_type.is_dir() {
            dirs.insert(relative);
            collect_tree(root, &path, files, dirs)?;
        } else {
            files.insert(relative);
        }
    }
    Ok(())
}

/// Find a directory directly inside `parent` whose name matches `name`
/// ignoring ASCII case.
pub fn find_child_dir_ignore_case(parent: &Path, name: &str) -> ManagerResult<Option<PathBuf>> {
    let exact = parent.join(name);
    if exact.is_dir() {
        return Ok(Some(exact));
    }
    if !parent.is_dir() {
        return Ok(None);
    }

    let entries = fs::read_dir(parent).map_err(|e| ManagerError::read(parent, e))?;
    for entry in entries.flatten() {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.eq_ignore_ascii_case(name));
        if matches && entry.path().is_dir() {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

/// Applies a [`PresetsPolicy`] around the merge-copy.
#[derive(Debug, Clone)]
pub struct PresetsReconciler {
    policy: PresetsPolicy,
    version_tag: Option<String>,
}

impl PresetsReconciler {
    /// Create a reconciler for `policy`.
    ///
    /// `version_tag` names the folder used by
    /// [`PresetsPolicy::SeparateFolder`]; it is ignored by the other policies.
    pub fn new(policy: PresetsPolicy, version_tag: Option<String>) -> Self {
        Self {
            policy,
            version_tag,
        }
    }

    /// The configured policy.
    pub fn policy(&self) -> PresetsPolicy {
        self.policy
    }

    /// Snapshot the live presets and rewrite the scratch tree for the policy.
    ///
    /// Must run before the merge-copy.
    pub fn prepare(&self, scratch_root: &Path, live_root: &Path) -> ManagerResult<ReconcilePlan> {
        let live_presets = find_child_dir_ignore_case(live_root, PRESETS_DIR_NAME)?
            .unwrap_or_else(|| live_root.join(PRESETS_DIR_NAME));
        let snapshot = PresetsSnapshot::capture(&live_presets)?;

        let plan = ReconcilePlan {
            policy: self.policy,
            live_presets,
            snapshot,
        };

        let scratch_presets = match find_child_dir_ignore_case(scratch_root, PRESETS_DIR_NAME)? {
            Some(dir) => dir,
            None => {
                tracing::debug!("Archive carries no Presets directory");
                return Ok(plan);
            }
        };

        match self.policy {
            PresetsPolicy::Overwrite => {}
            PresetsPolicy::KeepExisting => {
                remove_tree(&scratch_presets)?;
                tracing::debug!("Dropped archive presets to keep existing ones");
            }
            PresetsPolicy::SeparateFolder => {
                let folder = sanitize_version_tag(self.version_tag.as_deref().unwrap_or(""));
                let target = plan.live_presets.join(&folder);
                if target.exists() {
                    remove_tree(&target)?;
                }
                let copied = copy_dir_recursive(&scratch_presets, &target)?;
                remove_tree(&scratch_presets)?;
                tracing::info!(
                    folder = %folder,
                    files = copied,
                    "Installed archive presets into version folder"
                );
            }
        }

        Ok(plan)
    }
}

/// State carried from [`PresetsReconciler::prepare`] to the post-copy pass.
#[derive(Debug)]
pub struct ReconcilePlan {
    policy: PresetsPolicy,
    live_presets: PathBuf,
    snapshot: PresetsSnapshot,
}

impl ReconcilePlan {
    /// Directory the merge-copy must not descend into, if any.
    pub fn merge_exclusion(&self) -> Option<&Path> {
        match self.policy {
            PresetsPolicy::KeepExisting => Some(&self.live_presets),
            _ => None,
        }
    }

    /// The live presets snapshot taken before the merge.
    pub fn snapshot(&self) -> &PresetsSnapshot {
        &self.snapshot
    }

    /// Post-copy correction; a no-op unless the policy is `KeepExisting`.
    pub fn finish(self) -> ManagerResult<()> {
        if self.policy != PresetsPolicy::KeepExisting {
            return Ok(());
        }

        if !self.snapshot.existed {
            if self.live_presets.exists() {
                tracing::debug!("Removing Presets directory recreated by merge");
                remove_tree(&self.live_presets)?;
            }
            return Ok(());
        }

        let mut files = BTreeSet::new();
        let mut dirs = BTreeSet::new();
        if self.live_presets.is_dir() {
            collect_tree(&self.live_presets, &self.live_presets, &mut files, &mut dirs)?;
        }

        let introduced: Vec<&PathBuf> = files.difference(&self.snapshot.files).collect();
        for relative in &introduced {
            let path = self.live_presets.join(relative);
            fs::remove_file(&path).map_err(|e| ManagerError::remove(&path, e))?;
        }
        if !introduced.is_empty() {
            tracing::debug!(files = introduced.len(), "Removed presets introduced by merge");
        }

        // Deepest first so parents empty out before they are checked.
        let mut new_dirs: Vec<&PathBuf> = dirs.difference(&self.snapshot.dirs).collect();
        new_dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for relative in new_dirs {
            let path = self.live_presets.join(relative);
            let is_empty = fs::read_dir(&path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                fs::remove_dir(&path).map_err(|e| ManagerError::remove(&path, e))?;
            }
        }

        Ok(())
    }
}

fn remove_tree(path: &Path) -> ManagerResult<()> {
    fs::remove_dir_all(path).map_err(|e| ManagerError::remove(path, e))
}
