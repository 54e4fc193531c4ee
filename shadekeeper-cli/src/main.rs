//! Shadekeeper CLI - install and update ReShade frameworks and effect packages.

mod commands;
mod error;

use clap::{Parser, Subcommand};
use shadekeeper::logging::init_logging;
use tracing::info;

use commands::config::ConfigCommands;
use commands::framework::FrameworkCommands;
use commands::packages::PackagesCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "shadekeeper", version, about)]
struct Cli {
    /// Log debug output to stderr as well as the log file
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install, update or inspect a framework
    #[command(subcommand)]
    Framework(FrameworkCommands),

    /// Browse the catalog and install effect packages
    #[command(subcommand)]
    Packages(PackagesCommands),

    /// Read or edit the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        match e {
            CliError::Cancelled => eprintln!("Cancelled."),
            ref e => eprintln!("Error: {}", e),
        }
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = commands::common::load_config();
    let mut logging = config.logging_config().with_stderr(cli.verbose);
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    // Dropping the guard flushes buffered log lines, so it lives until exit.
    let _guard = init_logging(&logging).map_err(CliError::Logging)?;
    info!(version = shadekeeper::VERSION, "shadekeeper starting");

    match cli.command {
        Commands::Framework(command) => commands::framework::run(command),
        Commands::Packages(command) => commands::packages::run(command),
        Commands::Config(command) => commands::config::run(command),
    }
}
