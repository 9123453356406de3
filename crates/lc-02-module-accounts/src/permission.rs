//! Permission tags a module account may hold.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shared_types::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// May create new coins.
    Minter,
    /// May destroy coins it holds.
    Burner,
    /// May hold delegated (bonded or unbonding) stake.
    Staking,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Self::Minter, Self::Burner, Self::Staking];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minter => "minter",
            Self::Burner => "burner",
            Self::Staking => "staking",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownPermission(s.to_string()))
    }
}
