//! Choosing which catalog entries an install covers.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::{Addon, Catalog, EffectPackage, Selection};

/// Which catalog entries to install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMode {
    /// Every package and every add-on with a download URL.
    #[default]
    All,
    /// Required or pre-selected packages; no add-ons.
    EssentialOnly,
    /// Entries named by the caller.
    Custom,
}

impl InstallMode {
    /// Wire-level integer code.
    pub fn code(self) -> u8 {
        match self {
            Self::All => 0,
            Self::EssentialOnly => 1,
            Self::Custom => 2,
        }
    }

    /// Parse a wire-level integer code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::All),
            1 => Some(Self::EssentialOnly),
            2 => Some(Self::Custom),
            _ => None,
        }
    }
}

impl FromStr for InstallMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" | "0" => Ok(Self::All),
            "essential" | "essential-only" | "essential_only" | "1" => Ok(Self::EssentialOnly),
            "custom" | "2" => Ok(Self::Custom),
            other => Err(format!("unknown install mode '{}'", other)),
        }
    }
}

/// Packages and add-ons picked from a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSelection {
    pub packages: Vec<EffectPackage>,
    pub addons: Vec<Addon>,
}

impl CatalogSelection {
    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.addons.is_empty()
    }

    /// Number of packages plus add-ons.
    pub fn len(&self) -> usize {
        self.packages.len() + self.addons.len()
    }

    /// Restrict packages named in `files` to the listed effect files.
    ///
    /// Keys are package names matched ignoring ASCII case.
    pub fn apply_file_selection(&mut self, files: &HashMap<String, Vec<String>>) {
        for package in &mut self.packages {
            let chosen = files
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&package.name))
                .map(|(_, names)| names);
            if let Some(names) = chosen {
                package.select_files(names.as_slice());
            }
        }
    }
}

/// Pick catalog entries for `mode`.
///
/// `custom_names` is only consulted for [`InstallMode::Custom`], where it is
/// matched against package and add-on names ignoring ASCII case.
pub fn select<S: AsRef<str>>(
    catalog: &Catalog,
    mode: InstallMode,
    custom_names: &[S],
) -> CatalogSelection {
    let named = |name: &str| {
        custom_names
            .iter()
            .any(|n| n.as_ref().trim().eq_ignore_ascii_case(name))
    };

    match mode {
        InstallMode::All => CatalogSelection {
            packages: catalog
                .packages
                .iter()
                .cloned()
                .map(|mut p| {
                    if p.selected == Selection::None {
                        p.selected = Selection::All;
                    }
                    p
                })
                .collect(),
            addons: catalog.addons.iter().filter(|a| a.enabled()).cloned().collect(),
        },
        InstallMode::EssentialOnly => CatalogSelection {
            packages: catalog
                .packages
                .iter()
                .filter(|p| !p.modifiable || p.selected != Selection::None)
                .cloned()
                .collect(),
            addons: Vec::new(),
        },
        InstallMode::Custom => CatalogSelection {
            packages: catalog
                .packages
                .iter()
                .filter(|p| named(&p.name))
                .cloned()
                .map(|mut p| {
                    if p.selected == Selection::None {
                        p.selected = Selection::All;
                    }
                    p
                })
                .collect(),
            addons: catalog.addons.iter().filter(|a| named(&a.name)).cloned().collect(),
        },
    }
}
