//! Generic merge-copy of an extracted tree into a live install directory.
//!
//! The copy knows nothing about install policies: it copies every file,
//! creates directories as needed and overwrites same-named files. The only
//! knob is an optional excluded directory below the destination that the
//! copy refuses to descend into.

use std::fs;
use std::path::{Component, Path, PathBuf};

use super::error::{ManagerError, ManagerResult};

/// Recursively merge `source` into `dest`.
///
/// # Arguments
///
/// * `source` - Root of the tree to copy
/// * `dest` - Root of the live tree; created if missing
/// * `excluded` - Destination directory that must not be written to
///
/// # Returns
///
/// The destination-relative paths of every file written, in copy order.
pub fn merge_copy(
    source: &Path,
    dest: &Path,
    excluded: Option<&Path>,
) -> ManagerResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    merge_dir(source, dest, dest, excluded, &mut written)?;
    Ok(written)
}

/// Copy a directory tree to a fresh location, overwriting same-named files.
pub fn copy_dir_recursive(source: &Path, dest: &Path) -> ManagerResult<usize> {
    merge_copy(source, dest, None).map(|files| files.len())
}

fn merge_dir(
    source: &Path,
    dest: &Path,
    dest_root: &Path,
    excluded: Option<&Path>,
    written: &mut Vec<PathBuf>,
) -> ManagerResult<()> {
    if let Some(excluded) = excluded {
        if starts_with_ignore_case(dest, excluded) {
            tracing::debug!(path = %dest.display(), "Skipping excluded directory");
            return Ok(());
        }
    }

    fs::create_dir_all(dest).map_err(|e| ManagerError::create_dir(dest, e))?;

    let entries = fs::read_dir(source).map_err(|e| ManagerError::read(source, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ManagerError::read(source, e))?;
        let file_type = entry.file_type().map_err(|e| ManagerError::read(entry.path(), e))?;

        let source_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_dir() {
            merge_dir(&source_path, &dest_path, dest_root, excluded, written)?;
        } else if file_type.is_file() {
            if let Some(excluded) = excluded {
                if starts_with_ignore_case(&dest_path, excluded) {
                    continue;
                }
            }
            fs::copy(&source_path, &dest_path).map_err(|e| ManagerError::write(&dest_path, e))?;
            if let Ok(relative) = dest_path.strip_prefix(dest_root) {
                written.push(relative.to_path_buf());
            }
        } else {
            tracing::debug!(path = %source_path.display(), "Skipping non-regular file");
        }
    }

    Ok(())
}

/// Component-wise, ASCII case-insensitive `Path::starts_with`.
pub(crate) fn starts_with_ignore_case(path: &Path, prefix: &Path) -> bool {
    let mut path_components = path.components().filter(|c| *c != Component::CurDir);
    for prefix_component in prefix.components().filter(|c| *c != Component::CurDir) {
        match path_components.next() {
            Some(component) => {
                let a = component.as_os_str().to_string_lossy();
                let b = prefix_component.as_os_str().to_string_lossy();
                if !a.eq_ignore_ascii_case(&b) {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_merge_copy_overwrites_and_keeps_extra_files() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        fs::write(source.path().join("ReShade.fxh"), "new").unwrap();
        fs::create_dir(source.path().join("sub")).unwrap();
        fs::write(source.path().join("sub/b.txt"), "b").unwrap();

        fs::write(dest.path().join("ReShade.fxh"), "old").unwrap();
        fs::write(dest.path().join("user.ini"), "mine").unwrap();

        let written = merge_copy(source.path(), dest.path(), None).unwrap();

        assert_eq!(written.len(), 2);
        assert_eq!(
            fs::read_to_string(dest.path().join("ReShade.fxh")).unwrap(),
            "new"
        );
        assert_eq!(fs::read_to_string(dest.path().join("user.ini")).unwrap(), "mine");
        assert!(dest.path().join("sub/b.txt").is_file());
    }

    #[test]
    fn test_merge_copy_respects_exclusion() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        fs::create_dir_all(source.path().join("Presets")).unwrap();
        fs::write(source.path().join("Presets/a.ini"), "shipped").unwrap();
        fs::write(source.path().join("dxgi.dll"), "bin").unwrap();

        let excluded = dest.path().join("presets");
        let written = merge_copy(source.path(), dest.path(), Some(&excluded)).unwrap();

        assert_eq!(written, vec![PathBuf::from("dxgi.dll")]);
        assert!(!dest.path().join("Presets").exists());
    }

    #[test]
    fn test_copy_dir_recursive() {
        let source = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();

        fs::write(source.path().join("file1.txt"), "hello").unwrap();
        let subdir = source.path().join("subdir");
        fs::create_dir(&subdir).unwrap();
        fs::write(subdir.join("file2.txt"), "world").unwrap();

        let target = dest.path().join("copied");
        let count = copy_dir_recursive(source.path(), &target).unwrap();

        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(target.join("file1.txt")).unwrap(), "hello");
        assert!(target.join("subdir/file2.txt").exists());
    }

    #[test]
    fn test_starts_with_ignore_case() {
        assert!(starts_with_ignore_case(
            Path::new("/game/PRESETS/x.ini"),
            Path::new("/game/Presets")
        ));
        assert!(!starts_with_ignore_case(
            Path::new("/game/PresetsOld/x.ini"),
            Path::new("/game/Presets")
        ));
        assert!(!starts_with_ignore_case(
            Path::new("/game"),
            Path::new("/game/Presets")
        ));
    }
}
