//! Shader package and add-on catalogs.
//!
//! Two INI documents describe installable content:
//!
//! - `EffectPackages.ini` - shader packages with per-file selection rules
//! - `Addons.ini` - compiled add-ons, optionally bundling effect files
//!
//! [`CatalogClient`] fetches and parses both; [`select`] narrows a catalog
//! down to what an install covers.

mod client;
mod manifest;
mod model;
mod selection;

pub use client::{
    CatalogClient, CatalogConfig, DocumentFetcher, HttpDocumentFetcher, Mirror,
    DEFAULT_ADDONS_PATH, DEFAULT_CATALOG_BASE_URL, DEFAULT_EFFECTS_PATH,
};
pub use manifest::{Manifest, ManifestParseError, ManifestSection};
pub use model::{
    normalize_install_path, parse_addons, parse_effect_packages, Addon, Catalog, EffectFile,
    EffectPackage, Selection, ADDON_PATH, DEFAULT_SHADER_PATH, DEFAULT_TEXTURE_PATH,
};
pub use selection::{select, CatalogSelection, InstallMode};
