//! # Validation Errors
//!
//! Errors raised when a primitive is constructed from untrusted input.

use thiserror::Error;

/// Rejection of a malformed domain primitive.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Score outside the inclusive 0–100 range.
    #[error("score {0} is outside 0..=100")]
    ScoreOutOfRange(i64),

    /// Unknown difficulty letter.
    #[error("unknown difficulty {0:?} (expected C, B, A or S)")]
    UnknownDifficulty(String),

    /// Unknown rank name.
    #[error("unknown rank {0:?}")]
    UnknownRank(String),
}
