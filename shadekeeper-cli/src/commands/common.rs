//! Common types and utilities shared across CLI commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use shadekeeper::bridge::{ProgressBridge, ProgressSource};
use shadekeeper::catalog::{InstallMode, Mirror};
use shadekeeper::config::ConfigFile;
use shadekeeper::manager::PresetsPolicy;
use shadekeeper::package::InstallTarget;
use shadekeeper::FrameworkVariant;
use tokio_util::sync::CancellationToken;

use crate::error::CliError;

/// Framework variant selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum VariantArg {
    /// Upstream ReShade
    #[default]
    Stock,
    /// OpenReShade fork
    Open,
}

impl From<VariantArg> for FrameworkVariant {
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Stock => FrameworkVariant::Stock,
            VariantArg::Open => FrameworkVariant::Open,
        }
    }
}

/// Package install target for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum TargetArg {
    #[default]
    Stock,
    Open,
    Both,
}

impl From<TargetArg> for InstallTarget {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Stock => InstallTarget::Stock,
            TargetArg::Open => InstallTarget::Open,
            TargetArg::Both => InstallTarget::Both,
        }
    }
}

/// Package selection mode for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum ModeArg {
    /// Every package and every add-on with a download
    #[default]
    All,
    /// Required and pre-selected packages only
    Essential,
    /// Packages and add-ons named with --package
    Custom,
}

impl From<ModeArg> for InstallMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::All => InstallMode::All,
            ModeArg::Essential => InstallMode::EssentialOnly,
            ModeArg::Custom => InstallMode::Custom,
        }
    }
}

/// Presets handling for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum PresetsArg {
    /// Replace presets shipped in the archive
    #[default]
    Overwrite,
    /// Leave existing presets untouched
    Keep,
    /// Put the archive's presets into a folder named after the version
    Separate,
}

impl From<PresetsArg> for PresetsPolicy {
    fn from(arg: PresetsArg) -> Self {
        match arg {
            PresetsArg::Overwrite => PresetsPolicy::Overwrite,
            PresetsArg::Keep => PresetsPolicy::KeepExisting,
            PresetsArg::Separate => PresetsPolicy::SeparateFolder,
        }
    }
}

/// Load the config file, falling back to defaults with a warning.
pub fn load_config() -> ConfigFile {
    ConfigFile::load().unwrap_or_else(|e| {
        eprintln!("Warning: {}; using defaults", e);
        ConfigFile::default()
    })
}

/// The configured mirror when `use_mirror` is set, otherwise direct downloads.
pub fn resolve_mirror(use_mirror: bool, config: &ConfigFile) -> Result<Mirror, CliError> {
    if !use_mirror {
        return Ok(Mirror::Direct);
    }
    match config.mirror() {
        Mirror::Direct => Err(CliError::Config(
            "No mirror configured. Set one with 'shadekeeper config set catalog.mirror_prefix <URL>'."
                .to_string(),
        )),
        mirror => Ok(mirror),
    }
}

/// Parse repeated `package=file.fx` arguments into a per-package file list.
pub fn parse_file_selection(args: &[String]) -> Result<HashMap<String, Vec<String>>, CliError> {
    let mut files: HashMap<String, Vec<String>> = HashMap::new();
    for arg in args {
        let (package, file) = arg
            .split_once('=')
            .map(|(p, f)| (p.trim(), f.trim()))
            .filter(|(p, f)| !p.is_empty() && !f.is_empty())
            .ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --file '{}'. Expected <package>=<file.fx>.",
                    arg
                ))
            })?;
        files
            .entry(package.to_string())
            .or_default()
            .push(file.to_string());
    }
    Ok(files)
}

/// Cancel `token` on Ctrl-C.
pub fn cancel_on_ctrlc(token: CancellationToken) -> Result<(), CliError> {
    ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("Cancelling...");
        token.cancel();
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))
}

/// A progress bar with the given template.
pub fn progress_bar(template: &str) -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars("=>-"));
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Stream progress of `status` into `render` until the session stops.
pub fn watch_progress<S, F>(status: Arc<S>, interval: Duration, mut render: F) -> Result<(), CliError>
where
    S: ProgressSource,
    F: FnMut(S::Snapshot),
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| CliError::Config(format!("Failed to start progress runtime: {}", e)))?;

    runtime.block_on(async move {
        let mut rx = ProgressBridge::new(status)
            .with_interval(interval)
            .spawn(CancellationToken::new());
        while let Some(snapshot) = rx.recv().await {
            render(snapshot);
        }
    });
    Ok(())
}
