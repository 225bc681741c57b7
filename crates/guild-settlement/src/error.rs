//! Ledger and settlement error types.

use guild_core::{AttemptId, PartyId, QuestId};
use guild_state::{AttemptError, AttemptStatus, QuestError, QuestStatus};

use crate::store::StoreError;

/// Errors from [`crate::AttemptLedger`]. All but `Store` are client errors
/// and leave the ledger unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("quest {0} not found")]
    QuestNotFound(QuestId),

    #[error("party {0} not found")]
    PartyNotFound(PartyId),

    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),

    #[error("party {party_id} has no active attempt at quest {quest_id}")]
    NoActiveAttempt { quest_id: QuestId, party_id: PartyId },

    #[error("party {party_id} already attempted quest {quest_id}")]
    AlreadyAttempted { quest_id: QuestId, party_id: PartyId },

    #[error("quest {quest_id} is full ({max_attempts} attempts)")]
    QuestFull { quest_id: QuestId, max_attempts: u32 },

    #[error("quest {quest_id} is {status} and does not accept attempts")]
    QuestNotAcceptingAttempts { quest_id: QuestId, status: QuestStatus },

    #[error("attempt {attempt_id} is {status}, only submitted attempts can be rescored")]
    NotSubmitted {
        attempt_id: AttemptId,
        status: AttemptStatus,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("settlement queue unavailable")]
    QueueUnavailable,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<QuestError> for LedgerError {
    fn from(e: QuestError) -> Self {
        match e {
            QuestError::Full { id, max_attempts } => Self::QuestFull {
                quest_id: id,
                max_attempts,
            },
            QuestError::NotAcceptingAttempts { id, status } => {
                Self::QuestNotAcceptingAttempts {
                    quest_id: id,
                    status,
                }
            }
            QuestError::AlreadyCompleted { id } => Self::QuestNotAcceptingAttempts {
                quest_id: id,
                status: QuestStatus::Completed,
            },
            QuestError::InvalidTransition { from, to } => {
                Self::Validation(format!("invalid quest transition {from} -> {to}"))
            }
        }
    }
}

/// Errors from [`crate::SettlementEngine`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    #[error("attempt {0} not found")]
    AttemptNotFound(AttemptId),

    #[error("quest {0} not found")]
    QuestNotFound(QuestId),

    #[error("party {0} not found")]
    PartyNotFound(PartyId),

    /// Only submitted attempts are scored. Seeing anything else usually means
    /// a concurrent settlement already handled the attempt.
    #[error("attempt {attempt_id} is {status}, not submitted")]
    NotSubmitted {
        attempt_id: AttemptId,
        status: AttemptStatus,
    },

    /// Compare-and-swap retries ran out. Needs manual reconciliation.
    #[error("gave up on {record} after {attempts} conflicting writes")]
    RetriesExhausted { record: String, attempts: u32 },

    #[error(transparent)]
    Quest(#[from] QuestError),

    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
