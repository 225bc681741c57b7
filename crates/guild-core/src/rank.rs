//! # Rank Ladder
//!
//! A party's rank is derived from its RP through fixed ascending thresholds.
//! The rank is always the highest threshold not exceeding the RP.
//!
//! ```text
//! Bronze 0 ─▶ Silver 100 ─▶ Gold 300 ─▶ Platinum 600 ─▶ Adamantite 1000
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Party rank tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Adamantite,
}

/// Ascending `(minimum rp, rank)` thresholds.
pub const RANK_THRESHOLDS: [(u64, Rank); 5] = [
    (0, Rank::Bronze),
    (100, Rank::Silver),
    (300, Rank::Gold),
    (600, Rank::Platinum),
    (1000, Rank::Adamantite),
];

impl Rank {
    /// The rank earned by the given RP total.
    pub fn for_rp(rp: u64) -> Rank {
        RANK_THRESHOLDS
            .iter()
            .rev()
            .find(|(min, _)| rp >= *min)
            .map(|(_, rank)| *rank)
            .unwrap_or(Rank::Bronze)
    }

    /// Minimum RP for this rank.
    pub fn threshold(&self) -> u64 {
        match self {
            Self::Bronze => 0,
            Self::Silver => 100,
            Self::Gold => 300,
            Self::Platinum => 600,
            Self::Adamantite => 1000,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
            Self::Adamantite => "adamantite",
        }
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Rank {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bronze" => Ok(Self::Bronze),
            "silver" => Ok(Self::Silver),
            "gold" => Ok(Self::Gold),
            "platinum" => Ok(Self::Platinum),
            "adamantite" => Ok(Self::Adamantite),
            _ => Err(ValidationError::UnknownRank(s.to_string())),
        }
    }
}
