//! Catalog entries: effect packages and add-ons.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use super::manifest::{Manifest, ManifestSection};

/// Default install path for shader files, relative to a target directory.
pub const DEFAULT_SHADER_PATH: &str = "reshade-shaders/Shaders";

/// Default install path for texture files.
pub const DEFAULT_TEXTURE_PATH: &str = "reshade-shaders/Textures";

/// Install path for add-on binaries.
pub const ADDON_PATH: &str = "reshade-shaders/Addons";

/// Selection state of an effect package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Selection {
    /// Every effect file is installed.
    All,
    /// The package is not installed.
    None,
    /// Only effect files marked selected are installed.
    Partial,
}

/// One shader file listed by a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectFile {
    pub file_name: String,
    pub selected: bool,
}

/// A shader package from the effect catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectPackage {
    pub name: String,
    pub description: String,
    pub selected: Selection,
    /// `false` for required packages.
    pub modifiable: bool,
    pub install_path: Option<PathBuf>,
    pub texture_install_path: Option<PathBuf>,
    pub download_url: String,
    pub repository_url: String,
    pub effect_files: Vec<EffectFile>,
    pub deny_effect_files: BTreeSet<String>,
}

impl EffectPackage {
    /// Build a package from its catalog section.
    pub fn from_section(section_name: &str, section: &ManifestSection) -> Self {
        let required = section.get_flag("Required");
        let selected = if required || section.get_flag("Enabled") {
            Selection::All
        } else {
            Selection::None
        };

        let deny_effect_files: BTreeSet<String> =
            section.get_list("DenyEffectFiles").into_iter().collect();
        let effect_files = section
            .get_list("EffectFiles")
            .into_iter()
            .filter(|name| !deny_effect_files.contains(name))
            .map(|file_name| EffectFile {
                file_name,
                selected: false,
            })
            .collect();

        Self {
            name: section
                .get_string("PackageName")
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| section_name.to_string()),
            description: section.get_string("PackageDescription").unwrap_or_default(),
            selected,
            modifiable: !required,
            install_path: section
                .get_string("InstallPath")
                .and_then(|p| normalize_install_path(&p)),
            texture_install_path: section
                .get_string("TextureInstallPath")
                .and_then(|p| normalize_install_path(&p)),
            download_url: section.get_string("DownloadUrl").unwrap_or_default(),
            repository_url: section.get_string("RepositoryUrl").unwrap_or_default(),
            effect_files,
            deny_effect_files,
        }
    }

    /// Whether the package is always installed.
    pub fn is_required(&self) -> bool {
        !self.modifiable
    }

    /// Shader install path relative to a target directory.
    pub fn shader_dir(&self) -> PathBuf {
        self.install_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHADER_PATH))
    }

    /// Texture install path relative to a target directory.
    pub fn texture_dir(&self) -> PathBuf {
        self.texture_install_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEXTURE_PATH))
    }

    /// Restrict the package to the named effect files.
    ///
    /// The package becomes [`Selection::Partial`]. Names are matched ignoring
    /// ASCII case; unknown names are ignored.
    pub fn select_files<S: AsRef<str>>(&mut self, names: &[S]) {
        for file in &mut self.effect_files {
            file.selected = names
                .iter()
                .any(|n| n.as_ref().eq_ignore_ascii_case(&file.file_name));
        }
        self.selected = Selection::Partial;
    }

    /// Whether `file_name` survives the deny list and, for partial packages,
    /// the per-file selection.
    pub fn allows_file(&self, file_name: &str) -> bool {
        if self
            .deny_effect_files
            .iter()
            .any(|d| d.eq_ignore_ascii_case(file_name))
        {
            return false;
        }
        if self.selected != Selection::Partial {
            return true;
        }
        // Files the catalog does not list are kept; only unselected listed
        // files are dropped.
        self.effect_files
            .iter()
            .find(|f| f.file_name.eq_ignore_ascii_case(file_name))
            .map_or(true, |f| f.selected)
    }
}

/// A binary add-on from the add-on catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub name: String,
    pub description: String,
    pub effect_install_path: Option<PathBuf>,
    pub download_url: String,
    pub repository_url: String,
}

impl Addon {
    /// Build an add-on from its catalog section.
    ///
    /// The 64-bit download is preferred over the generic one.
    pub fn from_section(section_name: &str, section: &ManifestSection) -> Self {
        let download_url = section
            .get_string("DownloadUrl64")
            .filter(|u| !u.is_empty())
            .or_else(|| section.get_string("DownloadUrl"))
            .unwrap_or_default();

        Self {
            name: section
                .get_string("PackageName")
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| section_name.to_string()),
            description: section.get_string("PackageDescription").unwrap_or_default(),
            effect_install_path: section
                .get_string("EffectInstallPath")
                .and_then(|p| normalize_install_path(&p)),
            download_url,
            repository_url: section.get_string("RepositoryUrl").unwrap_or_default(),
        }
    }

    /// Whether the add-on can be installed.
    pub fn enabled(&self) -> bool {
        !self.download_url.is_empty()
    }

    /// Effect install path relative to a target directory.
    pub fn effect_dir(&self) -> PathBuf {
        self.effect_install_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SHADER_PATH))
    }
}

/// Both catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub packages: Vec<EffectPackage>,
    pub addons: Vec<Addon>,
}

impl Catalog {
    /// Build a catalog from parsed manifests.
    pub fn from_manifests(effects: &Manifest, addons: &Manifest) -> Self {
        Self {
            packages: parse_effect_packages(effects),
            addons: parse_addons(addons),
        }
    }
}

/// Every effect package in document order.
pub fn parse_effect_packages(manifest: &Manifest) -> Vec<EffectPackage> {
    manifest
        .sections()
        .map(|(name, section)| EffectPackage::from_section(name, section))
        .collect()
}

/// Every add-on in document order.
pub fn parse_addons(manifest: &Manifest) -> Vec<Addon> {
    manifest
        .sections()
        .map(|(name, section)| Addon::from_section(name, section))
        .collect()
}

/// Normalise a catalog install path such as `.\reshade-shaders\Shaders\qUINT`.
///
/// Returns a relative forward-slash path, or `None` when the path is empty,
/// absolute or climbs out of the target with `..`.
pub fn normalize_install_path(raw: &str) -> Option<PathBuf> {
    let unified = raw.trim().replace('\\', "/");
    if unified.starts_with('/') || unified.contains(':') {
        return None;
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(&unified).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if normalized.as_os_str().is_empty() {
        None
    } else {
        Some(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(text: &str) -> EffectPackage {
        let manifest = Manifest::parse(text).unwrap();
        parse_effect_packages(&manifest).remove(0)
    }

    #[test]
    fn test_required_package_is_selected_and_locked() {
        let pkg = package("[00]\nPackageName=Standard\nRequired=1\nEnabled=0\n");
        assert_eq!(pkg.selected, Selection::All);
        assert!(!pkg.modifiable);
        assert!(pkg.is_required());
    }

    #[test]
    fn test_optional_package_follows_enabled() {
        let on = package("[01]\nPackageName=On\nEnabled=1\n");
        let off = package("[02]\nPackageName=Off\nRequired=0\nEnabled=0\n");
        assert_eq!(on.selected, Selection::All);
        assert!(on.modifiable);
        assert_eq!(off.selected, Selection::None);
    }

    #[test]
    fn test_denied_files_are_not_listed() {
        let pkg = package("[00]\nEffectFiles=a.fx,b.fx,c.fx\nDenyEffectFiles=b.fx\n");
        let names: Vec<&str> = pkg.effect_files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.fx", "c.fx"]);
        assert!(pkg.effect_files.iter().all(|f| !f.selected));
    }

    #[test]
    fn test_name_falls_back_to_section() {
        let pkg = package("[Unnamed]\nDownloadUrl=https://x.test/a.zip\n");
        assert_eq!(pkg.name, "Unnamed");
    }

    #[test]
    fn test_install_paths_are_normalized() {
        let pkg = package(
            "[00]\nInstallPath=.\\reshade-shaders\\Shaders\\qUINT\nTextureInstallPath=..\\evil\n",
        );
        assert_eq!(pkg.shader_dir(), PathBuf::from("reshade-shaders/Shaders/qUINT"));
        assert_eq!(pkg.texture_dir(), PathBuf::from(DEFAULT_TEXTURE_PATH));
    }

    #[test]
    fn test_normalize_install_path() {
        assert_eq!(
            normalize_install_path(".\\reshade-shaders\\Textures"),
            Some(PathBuf::from("reshade-shaders/Textures"))
        );
        assert_eq!(normalize_install_path("C:\\Windows"), None);
        assert_eq!(normalize_install_path("/etc"), None);
        assert_eq!(normalize_install_path("a/../../b"), None);
        assert_eq!(normalize_install_path("."), None);
        assert_eq!(normalize_install_path(""), None);
    }

    #[test]
    fn test_partial_selection_filters_files() {
        let mut pkg = package("[00]\nEffectFiles=a.fx,b.fx,c.fx\nDenyEffectFiles=b.fx\n");
        pkg.select_files(&["A.fx"]);

        assert_eq!(pkg.selected, Selection::Partial);
        assert!(pkg.allows_file("a.fx"));
        assert!(!pkg.allows_file("b.fx"));
        assert!(!pkg.allows_file("c.fx"));
        assert!(pkg.allows_file("unlisted.fx"));
    }

    #[test]
    fn test_addon_prefers_64_bit_url() {
        let manifest = Manifest::parse(
            "[0]\nPackageName=Both\nDownloadUrl=https://x.test/any.zip\nDownloadUrl64=https://x.test/64.zip\n\
             [1]\nPackageName=Generic\nDownloadUrl64=\nDownloadUrl=https://x.test/any.zip\n\
             [2]\nPackageName=None\nDownloadUrl64=\nDownloadUrl=\n",
        )
        .unwrap();
        let addons = parse_addons(&manifest);

        assert_eq!(addons[0].download_url, "https://x.test/64.zip");
        assert_eq!(addons[1].download_url, "https://x.test/any.zip");
        assert!(!addons[2].enabled());
        assert_eq!(addons[2].effect_dir(), PathBuf::from(DEFAULT_SHADER_PATH));
    }
}
