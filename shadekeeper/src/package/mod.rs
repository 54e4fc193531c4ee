//! Effect package and add-on installation.
//!
//! A package install takes a [`CatalogSelection`](crate::catalog::CatalogSelection)
//! and places its content into one or both framework directories below a
//! base path:
//!
//! ```text
//! <base>/ReShade/                 <base>/OpenReShade/
//! ├── ReShade.ini                 ├── ReShade.ini
//! └── reshade-shaders/            └── reshade-shaders/
//!     ├── Shaders/                    ├── Shaders/
//!     ├── Textures/                   ├── Textures/
//!     └── Addons/                     └── Addons/
//! ```
//!
//! Downloads are located heuristically: a `Shaders`/`Textures` directory
//! when one exists, otherwise the shallowest directory holding matching
//! files.

mod locate;
mod search_paths;
mod session;
mod target;

pub use locate::{
    copy_matching, find_addon_binary, find_dir_named, find_shallowest_dir_with, is_addon_binary,
    is_shader_source, is_texture, locate_shaders, locate_textures, normalized_addon_file_name,
    Located, ADDON_EXTENSIONS,
};
pub use search_paths::{write_search_paths, SEARCH_PATH_FILE};
pub use session::{
    FileKind, PackageInstallHandle, PackageInstallReport, PackageInstallRequest,
    PackageInstallSession, PackageProgress, PackageStatus, UnitOutcome, UnitReport,
};
pub use target::InstallTarget;
