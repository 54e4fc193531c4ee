//! Configuration management CLI commands.
//!
//! `config get|set|unset|list|path` read and edit the INI file through the
//! typed [`ConfigKey`] accessors, so values are validated before saving.

use clap::Subcommand;
use console::style;
use shadekeeper::config::{config_file_path, ConfigFile, ConfigKey};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print a configuration value
    Get {
        /// Key as section.key (e.g., catalog.mirror_prefix)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Key as section.key (e.g., framework.stock_dir)
        key: String,

        /// New value; an empty string clears optional keys
        value: String,
    },

    /// Restore a key to its default value
    Unset {
        /// Key as section.key
        key: String,
    },

    /// List all settings, marking those that differ from the defaults
    List,

    /// Print the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Get { key } => {
            let key = parse_key(&key)?;
            let value = key.get(&ConfigFile::load()?);
            println!("{}", display_value(&value));
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let key = parse_key(&key)?;
            let mut config = ConfigFile::load()?;
            key.set(&mut config, &value)?;
            config.save()?;
            println!("Set {} = {}", key, display_value(&key.get(&config)));
            Ok(())
        }
        ConfigCommands::Unset { key } => {
            let key = parse_key(&key)?;
            let mut config = ConfigFile::load()?;
            let default = key.get(&ConfigFile::default());
            key.set(&mut config, &default)?;
            config.save()?;
            println!("Reset {} to {}", key, display_value(&default));
            Ok(())
        }
        ConfigCommands::List => run_list(),
        ConfigCommands::Path => {
            let path = config_file_path();
            if path.exists() {
                println!("{}", path.display());
            } else {
                println!("{} (not created yet)", path.display());
            }
            Ok(())
        }
    }
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'shadekeeper config list' to see available keys.",
            key
        ))
    })
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "(not set)"
    } else {
        value
    }
}

fn run_list() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    let defaults = ConfigFile::default();

    let mut current_section = "";
    for key in ConfigKey::all() {
        if key.section() != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", key.section());
            current_section = key.section();
        }

        let value = key.get(&config);
        let line = format!("  {} = {}", key.key_name(), display_value(&value));
        if value == key.get(&defaults) {
            println!("{}", line);
        } else {
            println!("{}", style(line).bold());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("download.timeout").unwrap(), ConfigKey::DownloadTimeout);
        assert!(matches!(parse_key("download"), Err(CliError::Config(_))));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(""), "(not set)");
        assert_eq!(display_value("info"), "info");
    }
}
