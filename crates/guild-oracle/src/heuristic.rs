//! # Length Heuristic
//!
//! Fallback scorer used when the LLM is unconfigured, unreachable, slow, or
//! returns something unusable. It sorts the result into one of three length
//! buckets by character count of the trimmed text:
//!
//! | Bucket        | Characters   | Score |
//! |---------------|--------------|-------|
//! | `Brief`       | `< 100`      | 35    |
//! | `Moderate`    | `100..500`   | 60    |
//! | `Substantial` | `>= 500`     | 75    |
//!
//! The verdict depends only on the bucket, so two results in the same bucket
//! always get the same score and feedback.

use guild_core::Score;

use crate::{Verdict, VerdictSource};

const MODERATE_MIN_CHARS: usize = 100;
const SUBSTANTIAL_MIN_CHARS: usize = 500;

/// Length class of a submitted result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthBucket {
    Brief,
    Moderate,
    Substantial,
}

impl LengthBucket {
    /// Classify a result.
    pub fn of(result_text: &str) -> Self {
        let chars = result_text.trim().chars().count();
        if chars < MODERATE_MIN_CHARS {
            Self::Brief
        } else if chars < SUBSTANTIAL_MIN_CHARS {
            Self::Moderate
        } else {
            Self::Substantial
        }
    }

    pub fn score(&self) -> Score {
        match self {
            Self::Brief => Score::clamped(35),
            Self::Moderate => Score::clamped(60),
            Self::Substantial => Score::clamped(75),
        }
    }

    pub fn feedback(&self) -> &'static str {
        match self {
            Self::Brief => {
                "Detailed scoring was unavailable. Scored by length heuristic: brief response."
            }
            Self::Moderate => {
                "Detailed scoring was unavailable. Scored by length heuristic: moderate response."
            }
            Self::Substantial => {
                "Detailed scoring was unavailable. Scored by length heuristic: substantial response."
            }
        }
    }
}

/// Score a result by length alone.
pub fn heuristic_verdict(result_text: &str) -> Verdict {
    let bucket = LengthBucket::of(result_text);
    Verdict {
        score: bucket.score(),
        feedback: bucket.feedback().to_string(),
        source: VerdictSource::Heuristic,
    }
}
