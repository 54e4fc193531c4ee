//! CLI error type.

use std::fmt;

use shadekeeper::config::ConfigError;
use shadekeeper::manager::ManagerError;

/// Errors surfaced by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Missing or inconsistent settings or arguments.
    Config(String),
    /// Reading or writing the configuration file failed.
    ConfigFile(ConfigError),
    /// An install or catalog operation failed.
    Manager(ManagerError),
    /// Logging could not be set up.
    Logging(std::io::Error),
    /// The user interrupted the operation.
    Cancelled,
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "{}", msg),
            Self::ConfigFile(e) => write!(f, "{}", e),
            Self::Manager(e) => write!(f, "{}", e.user_message()),
            Self::Logging(e) => write!(f, "Failed to initialize logging: {}", e),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigFile(e) => Some(e),
            Self::Manager(e) => Some(e),
            Self::Logging(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::ConfigFile(e)
    }
}

impl From<ManagerError> for CliError {
    fn from(e: ManagerError) -> Self {
        if e.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Manager(e)
        }
    }
}
