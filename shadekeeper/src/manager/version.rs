//! Persisted record of the installed framework version.
//!
//! One JSON document per variant lives at
//! `<data dir>/shadekeeper/versions/<variant>.json`. It is overwritten as a
//! whole after every successful install and read before update checks.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use super::error::{ManagerError, ManagerResult};
use crate::variant::FrameworkVariant;

/// Where an installed framework came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionSource {
    /// Downloaded from a published release.
    Release,
    /// Imported from an archive on disk.
    LocalImport,
}

/// The installed framework version for one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameworkVersionRecord {
    pub version: String,
    pub installed_at: DateTime<Utc>,
    pub source: VersionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FrameworkVersionRecord {
    /// Create a record stamped with the current time.
    pub fn new(version: impl Into<String>, source: VersionSource) -> Self {
        Self {
            version: version.into(),
            installed_at: Utc::now(),
            source,
            files: None,
            sha256: None,
        }
    }

    /// Attach the list of installed files.
    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = Some(files);
        self
    }

    /// Attach the archive digest.
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// Default location of the record for `variant`.
    pub fn default_path(variant: FrameworkVariant) -> Option<PathBuf> {
        dirs::data_dir().map(|d| {
            d.join("shadekeeper")
                .join("versions")
                .join(format!("{}.json", variant.id()))
        })
    }

    /// Load a record; `Ok(None)` if none was written yet.
    pub fn load(path: &Path) -> ManagerResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|e| ManagerError::read(path, e))?;
        serde_json::from_str(&content).map(Some).map_err(|e| {
            ManagerError::InvalidConfig(format!(
                "corrupt version record {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Write the record, replacing any previous one atomically.
    pub fn save(&self, path: &Path) -> ManagerResult<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| ManagerError::create_dir(parent, e))?;

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ManagerError::InvalidConfig(format!("cannot encode record: {}", e)))?;

        let mut temp =
            tempfile::NamedTempFile::new_in(parent).map_err(|e| ManagerError::write(parent, e))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| ManagerError::write(temp.path(), e))?;
        temp.persist(path)
            .map_err(|e| ManagerError::write(path, e.error))?;

        tracing::debug!(path = %path.display(), version = %self.version, "Saved version record");
        Ok(())
    }

    /// Whether `available` names a newer release than this record.
    ///
    /// Tags are compared as semantic versions when both parse; otherwise any
    /// difference counts as newer.
    pub fn is_outdated_by(&self, available: &str) -> bool {
        match (parse_lenient(&self.version), parse_lenient(available)) {
            (Some(installed), Some(available)) => available > installed,
            _ => self.version.trim() != available.trim(),
        }
    }
}

/// Parse `v6.3`, `6.3.0` and similar tags as a semantic version.
fn parse_lenient(tag: &str) -> Option<Version> {
    let trimmed = tag.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }
    let parts: Vec<&str> = trimmed.split('.').collect();
    let padded = match parts.len() {
        1 => format!("{}.0.0", trimmed),
        2 => format!("{}.0", trimmed),
        // Four-part tags such as 6.3.0.1 keep only the first three.
        _ => parts.iter().take(3).copied().collect::<Vec<_>>().join("."),
    };
    Version::parse(&padded).ok()
}

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+){1,3}").unwrap())
}

/// Infer a version tag from an archive file name.
///
/// `ReShade_Setup_6.3.0.zip` yields `6.3.0`.
pub fn infer_version_from_filename(path: &Path) -> Option<String> {
    let name = path.file_stem()?.to_str()?;
    version_pattern()
        .find(name)
        .map(|m| m.as_str().to_string())
}
