//! Persistent user configuration.
//!
//! Settings live in an INI file at `<config dir>/shadekeeper/config.ini`:
//!
//! ```ini
//! [framework]
//! stock_dir = /games/MyGame/ReShade
//! staging_dir = /tmp/shadekeeper
//!
//! [catalog]
//! base_url = https://raw.githubusercontent.com/crosire/reshade-shaders/list/
//! mirror_prefix = https://ghproxy.example/
//!
//! [download]
//! timeout = 300
//! progress_interval_ms = 100
//!
//! [logging]
//! level = info
//! ```
//!
//! Missing keys take their defaults. [`ConfigKey`] gives typed, validated
//! access to each `section.key` for the `config` command.

mod file;
mod keys;

pub use file::{
    config_file_path, default_log_dir, CatalogSettings, ConfigError, ConfigFile,
    DownloadSettings, FrameworkSettings, LoggingSettings,
};
pub use keys::ConfigKey;
