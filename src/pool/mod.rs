//! Pari-mutuel pool accounting
//!
//! Pure integer math in base units of the bet asset. Ratios are carried as
//! `Decimal`; nothing settlement-relevant touches floating point.

mod accounting;
mod types;

pub use accounting::{Pools, Quote};
pub use types::PoolError;

use serde::{Deserialize, Serialize};

/// Side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Outcome resolves true
    Yes,
    /// Outcome resolves false
    No,
}

impl Side {
    /// The winning side for a settled outcome
    pub fn from_outcome(outcome: bool) -> Self {
        if outcome {
            Self::Yes
        } else {
            Self::No
        }
    }

    /// Wire encoding used by the program (`true` = YES)
    pub fn as_outcome(self) -> bool {
        matches!(self, Self::Yes)
    }

    /// The other side
    pub fn opposite(self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Yes => f.write_str("YES"),
            Self::No => f.write_str("NO"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" => Ok(Self::Yes),
            "no" | "n" | "false" => Ok(Self::No),
            other => Err(format!("unknown side '{other}', expected yes or no")),
        }
    }
}
