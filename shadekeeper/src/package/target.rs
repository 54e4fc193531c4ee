//! Which framework installs a package set goes into.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::variant::FrameworkVariant;

/// Install destination(s) below a base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallTarget {
    #[default]
    Stock,
    Open,
    Both,
}

impl InstallTarget {
    /// Variants covered by this target.
    pub fn variants(self) -> Vec<FrameworkVariant> {
        match self {
            Self::Stock => vec![FrameworkVariant::Stock],
            Self::Open => vec![FrameworkVariant::Open],
            Self::Both => FrameworkVariant::ALL.to_vec(),
        }
    }

    /// Target directories below `base_path`, one per variant.
    pub fn directories(self, base_path: &Path) -> Vec<PathBuf> {
        self.variants()
            .into_iter()
            .map(|v| base_path.join(v.dir_name()))
            .collect()
    }
}

impl FromStr for InstallTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "both" => Ok(Self::Both),
            other => other.parse::<FrameworkVariant>().map(|v| match v {
                FrameworkVariant::Stock => Self::Stock,
                FrameworkVariant::Open => Self::Open,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directories() {
        let base = Path::new("/games/shaders");
        assert_eq!(
            InstallTarget::Both.directories(base),
            vec![base.join("ReShade"), base.join("OpenReShade")]
        );
        assert_eq!(InstallTarget::Open.directories(base), vec![base.join("OpenReShade")]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("both".parse::<InstallTarget>(), Ok(InstallTarget::Both));
        assert_eq!("stock".parse::<InstallTarget>(), Ok(InstallTarget::Stock));
        assert!("neither".parse::<InstallTarget>().is_err());
    }
}
