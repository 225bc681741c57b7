//! # Ledger Storage
//!
//! [`LedgerStore`] is the persistence seam for parties, quests and attempts.
//! Implementations: [`MemoryLedgerStore`] here, and the Postgres store in
//! `guild-api`.
//!
//! ## Optimistic Concurrency
//!
//! Every record carries a `version`. A conditional write succeeds only if
//! the stored version equals the version of the record passed in; the stored
//! version then becomes `version + 1`. A mismatch returns
//! [`StoreError::Conflict`] naming the record that lost the race, and nothing
//! is written.
//!
//! Compound writes ([`admit_attempt`], [`commit_score`], [`close_quest`]) are
//! atomic: either every record is written or none is.
//!
//! [`admit_attempt`]: LedgerStore::admit_attempt
//! [`commit_score`]: LedgerStore::commit_score
//! [`close_quest`]: LedgerStore::close_quest

pub mod memory;

pub use memory::MemoryLedgerStore;

use async_trait::async_trait;

use guild_core::{AttemptId, PartyId, QuestId};
use guild_state::{Attempt, AttemptStatus, Party, Quest, QuestStatus};

/// Which kind of record an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Party,
    Quest,
    Attempt,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Party => "party",
            Self::Quest => "quest",
            Self::Attempt => "attempt",
        })
    }
}

/// Errors returned by a [`LedgerStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Compare-and-swap failed: the stored version moved on.
    #[error("concurrent conflict on {kind} {id}: expected version {expected_version}")]
    Conflict {
        kind: RecordKind,
        id: String,
        expected_version: i64,
    },

    /// A uniqueness constraint was violated.
    #[error("duplicate {kind}: {detail}")]
    Duplicate { kind: RecordKind, detail: String },

    /// The record to update does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: RecordKind, id: String },

    /// Backend failure (connection, serialization, driver error).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn conflict(kind: RecordKind, id: impl ToString, expected_version: i64) -> Self {
        Self::Conflict {
            kind,
            id: id.to_string(),
            expected_version,
        }
    }

    pub fn not_found(kind: RecordKind, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Whether this is a version conflict on the given record kind.
    pub fn is_conflict_on(&self, kind: RecordKind) -> bool {
        matches!(self, Self::Conflict { kind: k, .. } if *k == kind)
    }
}

/// Persistence for the settlement ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    // ── Parties ───────────────────────────────────────────────────────

    async fn insert_party(&self, party: &Party) -> Result<(), StoreError>;

    async fn get_party(&self, id: PartyId) -> Result<Option<Party>, StoreError>;

    /// All parties, in no particular order.
    async fn list_parties(&self) -> Result<Vec<Party>, StoreError>;

    // ── Quests ────────────────────────────────────────────────────────

    async fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError>;

    async fn get_quest(&self, id: QuestId) -> Result<Option<Quest>, StoreError>;

    /// Quests, newest first, optionally filtered by status.
    async fn list_quests(&self, status: Option<QuestStatus>) -> Result<Vec<Quest>, StoreError>;

    // ── Attempts ──────────────────────────────────────────────────────

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StoreError>;

    /// The attempt of `party` at `quest`, if any.
    async fn find_attempt(
        &self,
        quest: QuestId,
        party: PartyId,
    ) -> Result<Option<Attempt>, StoreError>;

    /// Attempts of a quest, oldest first.
    async fn attempts_for_quest(&self, quest: QuestId) -> Result<Vec<Attempt>, StoreError>;

    /// Every attempt currently in `status`, oldest first.
    async fn attempts_with_status(&self, status: AttemptStatus)
        -> Result<Vec<Attempt>, StoreError>;

    // ── Conditional writes ────────────────────────────────────────────

    /// Write `quest` (version-checked) and insert the new `attempt`.
    ///
    /// Returns `Duplicate` if the (quest, party) pair already has an attempt.
    async fn admit_attempt(&self, quest: &Quest, attempt: &Attempt) -> Result<(), StoreError>;

    /// Write one attempt (version-checked).
    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), StoreError>;

    /// Write a scored attempt together with its party's new aggregates.
    async fn commit_score(&self, attempt: &Attempt, party: &Party) -> Result<(), StoreError>;

    /// Write a completed quest together with its won/lost attempts.
    async fn close_quest(&self, quest: &Quest, attempts: &[Attempt]) -> Result<(), StoreError>;

    /// Backend health check.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
