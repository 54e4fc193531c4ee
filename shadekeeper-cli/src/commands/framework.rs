//! Framework CLI commands: install or update a framework, show its version.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use indicatif::HumanBytes;
use shadekeeper::manager::{
    FrameworkInstallRequest, FrameworkInstallSession, FrameworkVersionRecord,
};
use shadekeeper::FrameworkVariant;

use super::common::{
    cancel_on_ctrlc, load_config, progress_bar, watch_progress, PresetsArg, VariantArg,
};
use crate::error::CliError;

/// Framework subcommands.
#[derive(Debug, Subcommand)]
pub enum FrameworkCommands {
    /// Install or update a framework from a release URL or a local archive
    Install {
        /// Release URL, file:// URL or path of a local archive
        #[arg(long)]
        source: String,

        /// Install directory (defaults to the configured directory of the variant)
        #[arg(long)]
        target: Option<PathBuf>,

        /// Framework variant
        #[arg(long, value_enum, default_value_t)]
        variant: VariantArg,

        /// What to do with presets shipped in the archive
        #[arg(long, value_enum, default_value_t)]
        presets: PresetsArg,

        /// Version being installed (inferred from local archive names)
        #[arg(long = "version")]
        version_tag: Option<String>,

        /// Delete a partial download when cancelled instead of keeping it for resume
        #[arg(long)]
        discard_partial: bool,
    },

    /// Show the recorded version of an installed framework
    Version {
        /// Framework variant
        #[arg(long, value_enum, default_value_t)]
        variant: VariantArg,

        /// Report whether this available version is newer
        #[arg(long)]
        check: Option<String>,
    },
}

/// Run a framework subcommand.
pub fn run(command: FrameworkCommands) -> Result<(), CliError> {
    match command {
        FrameworkCommands::Install {
            source,
            target,
            variant,
            presets,
            version_tag,
            discard_partial,
        } => run_install(InstallArgs {
            source,
            target,
            variant: variant.into(),
            presets,
            version_tag,
            discard_partial,
        }),
        FrameworkCommands::Version { variant, check } => run_version(variant.into(), check),
    }
}

struct InstallArgs {
    source: String,
    target: Option<PathBuf>,
    variant: FrameworkVariant,
    presets: PresetsArg,
    version_tag: Option<String>,
    discard_partial: bool,
}

fn run_install(args: InstallArgs) -> Result<(), CliError> {
    let config = load_config();
    let target = args
        .target
        .or_else(|| config.variant_dir(args.variant).map(PathBuf::from))
        .ok_or_else(|| {
            CliError::Config(format!(
                "No install directory for {}. Use --target or set framework.{}_dir.",
                args.variant,
                args.variant.id()
            ))
        })?;

    let mut request = FrameworkInstallRequest::new(&args.source, &target)
        .with_policy(args.presets.into())
        .with_discard_partial_on_cancel(args.discard_partial);
    if let Some(tag) = args.version_tag {
        request = request.with_version_tag(tag);
    }
    if let Some(path) = FrameworkVersionRecord::default_path(args.variant) {
        request = request.with_record_path(path);
    }

    println!("Installing {} into {}", args.variant, target.display());
    println!("  Source:  {}", args.source);
    println!("  Presets: {}", request.policy);
    println!();

    let manager_config = config.manager_config();
    let interval = manager_config.progress_interval;
    let session = FrameworkInstallSession::with_config(manager_config);
    let handle = session.start(request)?;
    cancel_on_ctrlc(handle.cancellation())?;

    let bar = progress_bar("{spinner:.green} {msg:12} [{bar:40.cyan/blue}] {bytes}/{total_bytes}");
    let mut archive_bytes = 0;
    watch_progress(handle.status(), interval, |progress| {
        if progress.total_bytes > 0 {
            bar.set_length(progress.total_bytes);
            archive_bytes = progress.total_bytes;
        }
        bar.set_position(progress.downloaded_bytes);
        bar.set_message(progress.state.name());
    })?;
    bar.finish_and_clear();

    let outcome = handle.wait()?;
    println!(
        "{} Installed {} files from a {} archive{}",
        style("✓").green(),
        outcome.installed_files.len(),
        HumanBytes(archive_bytes),
        outcome
            .version
            .map(|v| format!(" (version {})", v))
            .unwrap_or_default()
    );
    Ok(())
}

fn run_version(variant: FrameworkVariant, check: Option<String>) -> Result<(), CliError> {
    let path = FrameworkVersionRecord::default_path(variant)
        .ok_or_else(|| CliError::Config("Cannot determine the data directory".to_string()))?;

    let Some(record) = FrameworkVersionRecord::load(&path)? else {
        println!("{}: not installed (no record at {})", variant, path.display());
        return Ok(());
    };

    println!("{}", style(variant).bold());
    println!("  Version:   {}", record.version);
    println!("  Installed: {}", record.installed_at.to_rfc3339());
    println!("  Source:    {:?}", record.source);
    if let Some(files) = &record.files {
        println!("  Files:     {}", files.len());
    }
    if let Some(digest) = &record.sha256 {
        println!("  SHA-256:   {}", digest);
    }

    if let Some(available) = check {
        if record.is_outdated_by(&available) {
            println!("  Update available: {}", style(available).yellow());
        } else {
            println!("  Up to date");
        }
    }
    Ok(())
}
