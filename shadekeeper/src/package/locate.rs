//! Finding shader, texture and add-on files inside extracted downloads.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::manager::{ManagerError, ManagerResult};

/// File extensions of compiled add-ons.
pub const ADDON_EXTENSIONS: [&str; 3] = ["addon64", "addon32", "addon"];

const SHADER_EXTENSIONS: [&str; 1] = ["fx"];
const TEXTURE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// A directory found inside an extracted tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub dir: PathBuf,
    /// `true` when matched by directory name, `false` when found by content.
    pub by_name: bool,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Shallowest directory below `root` named exactly `name`.
pub fn find_dir_named(root: &Path, name: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_dir() && e.file_name().to_str() == Some(name))
        .min_by_key(|e| e.depth())
        .map(|e| e.into_path())
}

/// Shallowest directory (including `root`) holding a file with one of
/// `extensions`.
pub fn find_shallowest_dir_with(root: &Path, extensions: &[&str]) -> Option<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && has_extension(e.path(), extensions))
        .min_by_key(|e| e.depth())
        .and_then(|e| e.path().parent().map(Path::to_path_buf))
}

/// Locate the shader directory of an extracted package.
pub fn locate_shaders(root: &Path) -> Option<Located> {
    locate(root, "Shaders", &SHADER_EXTENSIONS)
}

/// Locate the texture directory of an extracted package.
pub fn locate_textures(root: &Path) -> Option<Located> {
    locate(root, "Textures", &TEXTURE_EXTENSIONS)
}

fn locate(root: &Path, name: &str, extensions: &[&str]) -> Option<Located> {
    if let Some(dir) = find_dir_named(root, name) {
        return Some(Located { dir, by_name: true });
    }
    find_shallowest_dir_with(root, extensions).map(|dir| Located {
        dir,
        by_name: false,
    })
}

/// Whether a file shader installs should keep when its directory was found
/// by content rather than by name.
pub fn is_shader_source(path: &Path) -> bool {
    has_extension(path, &["fx", "fxh"])
}

/// Whether a file is a texture image.
pub fn is_texture(path: &Path) -> bool {
    has_extension(path, &TEXTURE_EXTENSIONS)
}

/// Whether `path` already is a compiled add-on.
pub fn is_addon_binary(path: &Path) -> bool {
    has_extension(path, &ADDON_EXTENSIONS)
}

/// Pick the add-on binary from an extracted download.
///
/// Preference: a 64-bit binary, then a 32-bit one, then the only generic
/// `.addon`, then a generic `.addon` whose name hints at 64-bit.
pub fn find_addon_binary(root: &Path) -> Option<PathBuf> {
    let binaries: Vec<PathBuf> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file() && is_addon_binary(e.path()))
        .map(|e| e.into_path())
        .collect();

    let with_ext = |ext: &str| -> Vec<&PathBuf> {
        binaries
            .iter()
            .filter(|p| has_extension(p, &[ext]))
            .collect()
    };

    if let Some(found) = with_ext("addon64").first() {
        return Some((*found).clone());
    }
    if let Some(found) = with_ext("addon32").first() {
        return Some((*found).clone());
    }

    let generic = with_ext("addon");
    if generic.len() == 1 {
        return Some(generic[0].clone());
    }
    generic
        .into_iter()
        .find(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|s| s.to_ascii_lowercase().contains("64"))
        })
        .cloned()
}

/// File name an add-on binary is installed under.
///
/// Architecture suffixes are dropped and the extension becomes `.addon64`,
/// e.g. `renodx-x64.addon` becomes `renodx.addon64`.
pub fn normalized_addon_file_name(binary: &Path, fallback: &str) -> String {
    let stem = binary
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(fallback);

    let lower = stem.to_ascii_lowercase();
    let mut base = stem;
    for suffix in ["_x64", "-x64", ".x64", "x64", "_64", "-64", "64"] {
        if lower.ends_with(suffix) && stem.len() > suffix.len() {
            base = &stem[..stem.len() - suffix.len()];
            break;
        }
    }

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(['.', '_']);
    let name = if cleaned.is_empty() { fallback } else { cleaned };
    format!("{}.addon64", name)
}

/// Copy files under `source` accepted by `keep` into `dest`, preserving
/// relative paths. Returns the number of files copied.
pub fn copy_matching(
    source: &Path,
    dest: &Path,
    keep: impl Fn(&Path) -> bool,
) -> ManagerResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| ManagerError::ReadFailed {
            path: source.to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() || !keep(entry.path()) {
            continue;
        }
        let relative = match entry.path().strip_prefix(source) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| ManagerError::create_dir(parent, e))?;
        }
        fs::copy(entry.path(), &target).map_err(|e| ManagerError::write(&target, e))?;
        copied += 1;
    }
    Ok(copied)
}
