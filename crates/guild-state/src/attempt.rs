//! # Quest Attempt Lifecycle
//!
//! ```text
//! InProgress ──▶ Submitted ──▶ Scored ──▶ Won
//!                                 │
//!                                 └─────▶ Lost
//! ```
//!
//! `InProgress` and `Submitted` are *pending*: a quest cannot be settled while
//! any of its attempts is pending. `Scored` carries the Oracle score; the final
//! `Won`/`Lost` outcome is assigned only when the whole quest settles, so a
//! high score alone never makes an attempt the winner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use guild_core::{AttemptId, PartyId, QuestId, Score};

/// Lifecycle status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Scored,
    Won,
    Lost,
}

impl AttemptStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::Scored => "scored",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(Self::InProgress),
            "submitted" => Some(Self::Submitted),
            "scored" => Some(Self::Scored),
            "won" => Some(Self::Won),
            "lost" => Some(Self::Lost),
            _ => None,
        }
    }

    /// Still awaiting a result or a score.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::InProgress | Self::Submitted)
    }

    /// Has a score (scored, won or lost).
    pub fn has_score(&self) -> bool {
        matches!(self, Self::Scored | Self::Won | Self::Lost)
    }
}

impl std::fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by attempt lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error("attempt {id} is {status}, expected {expected}")]
    WrongStatus {
        id: AttemptId,
        status: AttemptStatus,
        expected: AttemptStatus,
    },
}

/// One party's attempt at one quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub quest_id: QuestId,
    pub party_id: PartyId,
    pub status: AttemptStatus,
    pub result_text: Option<String>,
    /// Tokens the agent reports having spent, if it reports at all.
    pub token_count: Option<u64>,
    pub score: Option<Score>,
    pub feedback: Option<String>,
    pub time_taken_seconds: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub scored_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: i64,
}

impl Attempt {
    /// Start a new attempt in `InProgress`.
    pub fn start(quest_id: QuestId, party_id: PartyId, now: DateTime<Utc>) -> Self {
        Self {
            id: AttemptId::new(),
            quest_id,
            party_id,
            status: AttemptStatus::InProgress,
            result_text: None,
            token_count: None,
            score: None,
            feedback: None,
            time_taken_seconds: None,
            started_at: now,
            submitted_at: None,
            scored_at: None,
            version: 0,
        }
    }

    /// Record the agent's result (InProgress → Submitted).
    pub fn submit(
        &mut self,
        result_text: String,
        token_count: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(), AttemptError> {
        self.require(AttemptStatus::InProgress)?;
        self.time_taken_seconds = Some(elapsed_seconds(self.started_at, now));
        self.result_text = Some(result_text);
        self.token_count = token_count;
        self.submitted_at = Some(now);
        self.status = AttemptStatus::Submitted;
        Ok(())
    }

    /// Record the Oracle verdict (Submitted → Scored).
    pub fn record_score(
        &mut self,
        score: Score,
        feedback: String,
        now: DateTime<Utc>,
    ) -> Result<(), AttemptError> {
        self.require(AttemptStatus::Submitted)?;
        self.score = Some(score);
        self.feedback = Some(feedback);
        self.scored_at = Some(now);
        self.status = AttemptStatus::Scored;
        Ok(())
    }

    /// Declare this attempt the quest winner (Scored → Won).
    pub fn mark_won(&mut self) -> Result<(), AttemptError> {
        self.require(AttemptStatus::Scored)?;
        self.status = AttemptStatus::Won;
        Ok(())
    }

    /// Declare this attempt beaten (Scored → Lost).
    pub fn mark_lost(&mut self) -> Result<(), AttemptError> {
        self.require(AttemptStatus::Scored)?;
        self.status = AttemptStatus::Lost;
        Ok(())
    }

    /// The submitted result, or an empty string before submission.
    pub fn result(&self) -> &str {
        self.result_text.as_deref().unwrap_or("")
    }

    fn require(&self, expected: AttemptStatus) -> Result<(), AttemptError> {
        if self.status != expected {
            return Err(AttemptError::WrongStatus {
                id: self.id,
                status: self.status,
                expected,
            });
        }
        Ok(())
    }
}

/// Whole seconds between two instants, rounded half up. Never negative.
pub fn elapsed_seconds(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    let millis = (to - from).num_milliseconds().max(0) as u64;
    (millis + 500) / 1000
}
