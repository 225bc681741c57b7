//! # Scores
//!
//! An Oracle score is an integer in `0..=100`. Two thresholds give it meaning:
//! [`COMPLETION_THRESHOLD`] separates completed from failed attempts in party
//! statistics, and [`WIN_THRESHOLD`] marks an attempt winner-eligible and
//! reward-earning.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Scores at or above this count as a completed quest for the party.
pub const COMPLETION_THRESHOLD: u8 = 50;

/// Scores at or above this are winner-eligible and earn the difficulty reward.
pub const WIN_THRESHOLD: u8 = 70;

/// A validated score in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    /// Maximum score.
    pub const MAX: Score = Score(100);

    /// Validate a raw score.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (0..=100).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::ScoreOutOfRange(value))
        }
    }

    /// Clamp an arbitrary integer into range. Used on LLM output, which is
    /// untrusted but should still yield a score.
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    /// The raw value.
    pub fn value(&self) -> u8 {
        self.0
    }

    /// Whether this score counts as a completed quest.
    pub fn is_completion(&self) -> bool {
        self.0 >= COMPLETION_THRESHOLD
    }

    /// Whether this score is winner-eligible.
    pub fn is_winner_eligible(&self) -> bool {
        self.0 >= WIN_THRESHOLD
    }
}

impl<'de> Deserialize<'de> for Score {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
