//! The two interchangeable framework distributions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A framework distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkVariant {
    /// The upstream ReShade build.
    Stock,
    /// The OpenReShade fork.
    Open,
}

impl FrameworkVariant {
    /// All variants, in display order.
    pub const ALL: [FrameworkVariant; 2] = [FrameworkVariant::Stock, FrameworkVariant::Open];

    /// Directory name of this variant's install below a base path.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Stock => "ReShade",
            Self::Open => "OpenReShade",
        }
    }

    /// Short identifier used in file names and on the command line.
    pub fn id(self) -> &'static str {
        match self {
            Self::Stock => "stock",
            Self::Open => "open",
        }
    }
}

impl fmt::Display for FrameworkVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for FrameworkVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stock" | "reshade" => Ok(Self::Stock),
            "open" | "openreshade" => Ok(Self::Open),
            other => Err(format!("unknown framework variant '{}'", other)),
        }
    }
}
