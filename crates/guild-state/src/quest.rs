//! # Quest Lifecycle State Machine
//!
//! ```text
//! Open ──▶ InProgress ──▶ Completed (terminal)
//!   │          │  ▲
//!   │          ▼  │
//!   │        Review
//!   │          │
//!   └──────────┴──────▶ Expired (terminal)
//! ```
//!
//! Transitions only move forward. A completed quest can never be reopened.
//! The first admitted attempt moves an open quest to `InProgress`; settlement
//! moves it to `Completed` when a winner is declared. `Review` and `Expired`
//! are modelled so stored rows round-trip, but nothing in this workspace
//! drives a quest into them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use guild_core::{AttemptId, Difficulty, QuestId};

/// Lifecycle status of a quest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestStatus {
    /// Posted, no attempts yet.
    Open,
    /// At least one attempt accepted.
    InProgress,
    /// Held for manual review.
    Review,
    /// Winner declared (terminal).
    Completed,
    /// Closed without a winner (terminal).
    Expired,
}

impl QuestStatus {
    /// Wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    /// Parse a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "review" => Some(Self::Review),
            "completed" => Some(Self::Completed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired)
    }

    /// Whether new attempts may be accepted in this status.
    pub fn accepts_attempts(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }

    /// The statuses reachable in one step from this one.
    pub fn valid_transitions(&self) -> &'static [QuestStatus] {
        match self {
            Self::Open => &[Self::InProgress, Self::Expired],
            Self::InProgress => &[Self::Review, Self::Completed, Self::Expired],
            Self::Review => &[Self::Completed, Self::Expired],
            Self::Completed | Self::Expired => &[],
        }
    }
}

impl std::fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by quest lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuestError {
    /// The requested transition is not a forward edge of the lifecycle.
    #[error("invalid quest transition: {from} -> {to}")]
    InvalidTransition { from: QuestStatus, to: QuestStatus },

    /// The quest is not in a status that accepts attempts.
    #[error("quest {id} is {status} and does not accept attempts")]
    NotAcceptingAttempts { id: QuestId, status: QuestStatus },

    /// The quest already has `max_attempts` attempts.
    #[error("quest {id} is full ({max_attempts} attempts)")]
    Full { id: QuestId, max_attempts: u32 },

    /// The quest already has a winner.
    #[error("quest {id} is already completed")]
    AlreadyCompleted { id: QuestId },
}

/// Fields supplied by a questgiver when posting a quest.
#[derive(Debug, Clone)]
pub struct NewQuest {
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Option<String>,
    pub difficulty: Difficulty,
    pub category: String,
    /// Escrowed gold advertised to parties.
    pub gold_reward: u64,
    /// Advertised RP. Defaults to the difficulty schedule.
    pub rp_reward: Option<u64>,
    pub max_attempts: u32,
}

/// A posted quest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quest {
    pub id: QuestId,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Option<String>,
    pub difficulty: Difficulty,
    pub category: String,
    pub gold_reward: u64,
    pub rp_reward: u64,
    pub max_attempts: u32,
    pub status: QuestStatus,
    pub winning_attempt_id: Option<AttemptId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: i64,
}

impl Quest {
    /// Post a new quest in the `Open` status.
    pub fn post(new: NewQuest, now: DateTime<Utc>) -> Self {
        let rp_reward = new.rp_reward.unwrap_or_else(|| new.difficulty.reward().rp);
        Self {
            id: QuestId::new(),
            title: new.title,
            description: new.description,
            acceptance_criteria: new.acceptance_criteria,
            difficulty: new.difficulty,
            category: new.category,
            gold_reward: new.gold_reward,
            rp_reward,
            max_attempts: new.max_attempts,
            status: QuestStatus::Open,
            winning_attempt_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Admit one more attempt, given how many the quest already has.
    ///
    /// Moves an open quest to `InProgress`. Capacity is checked before
    /// status, so a full quest reports `Full` even once it has closed.
    pub fn admit(&mut self, existing_attempts: usize, now: DateTime<Utc>) -> Result<(), QuestError> {
        if existing_attempts >= self.max_attempts as usize {
            return Err(QuestError::Full {
                id: self.id,
                max_attempts: self.max_attempts,
            });
        }
        if !self.status.accepts_attempts() {
            return Err(QuestError::NotAcceptingAttempts {
                id: self.id,
                status: self.status,
            });
        }
        if self.status == QuestStatus::Open {
            self.transition(QuestStatus::InProgress, now)?;
        } else {
            self.updated_at = now;
        }
        Ok(())
    }

    /// Declare the winning attempt and close the quest.
    pub fn complete(&mut self, winner: AttemptId, now: DateTime<Utc>) -> Result<(), QuestError> {
        if self.status == QuestStatus::Completed {
            return Err(QuestError::AlreadyCompleted { id: self.id });
        }
        self.transition(QuestStatus::Completed, now)?;
        self.winning_attempt_id = Some(winner);
        Ok(())
    }

    /// Whether the quest has a declared winner.
    pub fn is_completed(&self) -> bool {
        self.status == QuestStatus::Completed
    }

    fn transition(&mut self, to: QuestStatus, now: DateTime<Utc>) -> Result<(), QuestError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(QuestError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
