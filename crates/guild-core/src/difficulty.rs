//! # Quest Difficulty and Reward Schedule
//!
//! Difficulty is a four-letter ladder (`C < B < A < S`). The reward schedule
//! is keyed by difficulty: harder quests pay more RP and gold.
//!
//! Rewards are granted per attempt at scoring time to every attempt that
//! reaches [`WIN_THRESHOLD`], independently of which attempt later wins the
//! quest. Two attempts scoring 85 and 90 on the same quest are both paid.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::score::{Score, WIN_THRESHOLD};

/// Difficulty grade of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    C,
    B,
    A,
    S,
}

impl Difficulty {
    /// All grades in ascending order.
    pub const ALL: [Difficulty; 4] = [Self::C, Self::B, Self::A, Self::S];

    /// The single-letter name of this grade.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::C => "C",
            Self::B => "B",
            Self::A => "A",
            Self::S => "S",
        }
    }

    /// The win-equivalent reward for this grade.
    pub fn reward(&self) -> Reward {
        match self {
            Self::C => Reward { rp: 10, gold: 50 },
            Self::B => Reward { rp: 25, gold: 150 },
            Self::A => Reward { rp: 50, gold: 400 },
            Self::S => Reward { rp: 100, gold: 1000 },
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" => Ok(Self::C),
            "B" | "b" => Ok(Self::B),
            "A" | "a" => Ok(Self::A),
            "S" | "s" => Ok(Self::S),
            other => Err(ValidationError::UnknownDifficulty(other.to_string())),
        }
    }
}

/// RP and gold paid to a party for one scored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reward {
    pub rp: u64,
    pub gold: u64,
}

impl Reward {
    /// No payout.
    pub const ZERO: Reward = Reward { rp: 0, gold: 0 };

    /// The reward earned by an attempt of the given difficulty and score.
    ///
    /// Scores at or above [`WIN_THRESHOLD`] earn the full difficulty reward;
    /// anything below earns nothing.
    pub fn earned(difficulty: Difficulty, score: Score) -> Reward {
        if score.value() >= WIN_THRESHOLD {
            difficulty.reward()
        } else {
            Reward::ZERO
        }
    }

    /// Whether this reward pays anything.
    pub fn is_zero(&self) -> bool {
        self.rp == 0 && self.gold == 0
    }
}
