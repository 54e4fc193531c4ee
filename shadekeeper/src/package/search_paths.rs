//! The framework configuration file telling it where shaders live.

use std::path::Path;

use ini::{EscapePolicy, Ini};

use crate::manager::{ManagerError, ManagerResult};

/// Name of the framework configuration file in a target directory.
pub const SEARCH_PATH_FILE: &str = "ReShade.ini";

const EFFECT_SEARCH_PATHS: &str = ".\\reshade-shaders\\Shaders\\**";
const TEXTURE_SEARCH_PATHS: &str = ".\\reshade-shaders\\Textures\\**";
/// Home key, no modifiers.
const KEY_OVERLAY: &str = "36,0,0,0";

/// Write the search-path configuration into `target_dir` unless one exists.
///
/// Returns `true` if a file was written.
pub fn write_search_paths(target_dir: &Path) -> ManagerResult<bool> {
    let path = target_dir.join(SEARCH_PATH_FILE);
    if path.exists() {
        tracing::debug!(path = %path.display(), "Keeping existing search-path configuration");
        return Ok(false);
    }

    let mut conf = Ini::new();
    conf.with_section(Some("GENERAL"))
        .set("EffectSearchPaths", EFFECT_SEARCH_PATHS)
        .set("TextureSearchPaths", TEXTURE_SEARCH_PATHS);
    conf.with_section(Some("INPUT")).set("KeyOverlay", KEY_OVERLAY);

    std::fs::create_dir_all(target_dir).map_err(|e| ManagerError::create_dir(target_dir, e))?;
    conf.write_to_file_policy(&path, EscapePolicy::Nothing)
        .map_err(|e| ManagerError::write(&path, e))?;

    tracing::info!(path = %path.display(), "Wrote search-path configuration");
    Ok(true)
}
