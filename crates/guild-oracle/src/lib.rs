//! # guild-oracle: Quest Result Scoring
//!
//! Given a quest and a submitted result, the Oracle returns a score in
//! `0..=100` and a short feedback string.
//!
//! ## Layers
//!
//! - [`ScoringOracle`]: fallible scoring backend. [`LlmOracle`] implements
//!   it over the Anthropic Messages API.
//! - [`heuristic`]: deterministic length-bucket scorer, used whenever a
//!   backend cannot produce a verdict.
//! - [`ResilientOracle`]: what settlement actually calls. Wraps an optional
//!   backend in a timeout and never fails.
//!
//! ## Crate Policy
//!
//! - Depends on `guild-core` only.
//! - Oracle errors never escape [`ResilientOracle::score`].

pub mod config;
pub mod error;
pub mod heuristic;
pub mod llm;
pub mod resilient;
pub(crate) mod retry;

pub use config::{ConfigError, OracleConfig};
pub use error::OracleError;
pub use heuristic::{heuristic_verdict, LengthBucket};
pub use llm::LlmOracle;
pub use resilient::ResilientOracle;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use guild_core::{Difficulty, Score};

/// Everything the Oracle sees about one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRequest {
    pub quest_title: String,
    pub quest_description: String,
    pub acceptance_criteria: Option<String>,
    pub difficulty: Difficulty,
    pub result_text: String,
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Llm,
    Heuristic,
}

impl VerdictSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llm => "llm",
            Self::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for VerdictSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A score with its feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub score: Score,
    pub feedback: String,
    pub source: VerdictSource,
}

/// A scoring backend that may fail.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Score one submission.
    async fn score(&self, request: &ScoringRequest) -> Result<Verdict, OracleError>;
}
