//! Package CLI commands: list the catalog, install a package set.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use indicatif::HumanBytes;
use shadekeeper::catalog::{Catalog, CatalogClient, InstallMode};
use shadekeeper::config::ConfigFile;
use shadekeeper::package::{
    FileKind, PackageInstallRequest, PackageInstallSession, UnitOutcome,
};

use super::common::{
    cancel_on_ctrlc, load_config, parse_file_selection, progress_bar, resolve_mirror,
    watch_progress, ModeArg, TargetArg,
};
use crate::error::CliError;

/// Package subcommands.
#[derive(Debug, Subcommand)]
pub enum PackagesCommands {
    /// List effect packages and add-ons in the catalog
    List {
        /// Fetch the catalog through the configured mirror
        #[arg(long)]
        mirror: bool,
    },

    /// Install effect packages and add-ons into framework directories
    Install {
        /// Directory holding the ReShade and OpenReShade installs
        #[arg(long)]
        base_path: PathBuf,

        /// Which framework installs to populate
        #[arg(long, value_enum, default_value_t)]
        target: TargetArg,

        /// Which catalog entries to install
        #[arg(long, value_enum, default_value_t)]
        mode: ModeArg,

        /// Package or add-on name (with --mode custom, repeatable)
        #[arg(long = "package")]
        packages: Vec<String>,

        /// Install only the named effect file of a package: <package>=<file.fx> (repeatable)
        #[arg(long = "file")]
        files: Vec<String>,

        /// Download through the configured mirror
        #[arg(long)]
        mirror: bool,
    },
}

/// Run a packages subcommand.
pub fn run(command: PackagesCommands) -> Result<(), CliError> {
    let config = load_config();
    match command {
        PackagesCommands::List { mirror } => run_list(&config, mirror),
        PackagesCommands::Install {
            base_path,
            target,
            mode,
            packages,
            files,
            mirror,
        } => run_install(
            &config,
            InstallArgs {
                base_path,
                target,
                mode,
                packages,
                files,
                mirror,
            },
        ),
    }
}

struct InstallArgs {
    base_path: PathBuf,
    target: TargetArg,
    mode: ModeArg,
    packages: Vec<String>,
    files: Vec<String>,
    mirror: bool,
}

fn fetch_catalog(config: &ConfigFile, use_mirror: bool) -> Result<Catalog, CliError> {
    let catalog_config = config
        .catalog_config()
        .with_mirror(resolve_mirror(use_mirror, config)?);
    let client = CatalogClient::new(catalog_config, config.manager_config().timeout)?;
    Ok(client.fetch()?)
}

fn run_list(config: &ConfigFile, use_mirror: bool) -> Result<(), CliError> {
    let catalog = fetch_catalog(config, use_mirror)?;

    println!("Effect Packages");
    println!("===============");
    for package in &catalog.packages {
        let flag = if package.is_required() {
            style("required").cyan().to_string()
        } else {
            format!("{:?}", package.selected).to_lowercase()
        };
        println!("  {:<40} {}", package.name, flag);
        if !package.description.is_empty() {
            println!("      {}", style(&package.description).dim());
        }
    }

    println!();
    println!("Add-ons");
    println!("=======");
    for addon in &catalog.addons {
        let flag = if addon.enabled() {
            "installable".to_string()
        } else {
            style("no download").yellow().to_string()
        };
        println!("  {:<40} {}", addon.name, flag);
    }
    Ok(())
}

fn run_install(config: &ConfigFile, args: InstallArgs) -> Result<(), CliError> {
    let mode = InstallMode::from(args.mode);
    if mode == InstallMode::Custom && args.packages.is_empty() {
        return Err(CliError::Config(
            "--mode custom needs at least one --package".to_string(),
        ));
    }
    let files = parse_file_selection(&args.files)?;
    let mirror = resolve_mirror(args.mirror, config)?;

    let catalog = fetch_catalog(config, args.mirror)?;
    let request = PackageInstallRequest::from_catalog(
        &catalog,
        &args.base_path,
        args.target.into(),
        mode,
        args.packages.as_slice(),
    )
    .with_file_selection(&files)
    .with_mirror(mirror);

    println!(
        "Installing {} packages and {} add-ons into {}",
        request.selection.packages.len(),
        request.selection.addons.len(),
        args.base_path.display()
    );
    println!();

    let manager_config = config.manager_config();
    let interval = manager_config.progress_interval;
    let session = PackageInstallSession::with_config(manager_config);
    let handle = session.start(request)?;
    cancel_on_ctrlc(handle.cancellation())?;

    let bar = progress_bar("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {wide_msg}");
    watch_progress(handle.status(), interval, |progress| {
        bar.set_length(progress.total_files);
        bar.set_position(progress.downloaded_files);
        let kind = match progress.current_file_kind {
            FileKind::Shader => "package",
            FileKind::Addon => "add-on",
        };
        bar.set_message(format!(
            "{} {} ({}/s)",
            kind,
            progress.current_file,
            HumanBytes(progress.download_speed)
        ));
    })?;
    bar.finish_and_clear();

    let report = handle.wait()?;
    for unit in &report.units {
        match &unit.outcome {
            UnitOutcome::Installed => {}
            UnitOutcome::Skipped => println!(
                "  {} {} skipped: no download",
                style("-").dim(),
                unit.name
            ),
            UnitOutcome::Failed(reason) => println!(
                "  {} {} ({}): {}",
                style("✗").red(),
                unit.name,
                unit.target_dir.display(),
                reason
            ),
        }
    }
    println!(
        "{} {} installed, {} skipped, {} failed",
        style("✓").green(),
        report.installed(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}
