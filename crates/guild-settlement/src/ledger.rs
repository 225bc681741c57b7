//! # Attempt Ledger
//!
//! The write path for parties, quests and attempts. Admission rules for
//! [`AttemptLedger::accept`], checked in this order:
//!
//! 1. the party has no attempt at the quest yet (`AlreadyAttempted`)
//! 2. the quest has fewer than `max_attempts` attempts (`QuestFull`)
//! 3. the quest is `open` or `in_progress` (`QuestNotAcceptingAttempts`)
//!
//! Admission writes the new attempt and bumps the quest version in one
//! conditional write. Two parties racing for the last slot therefore cannot
//! both succeed: the loser sees a quest conflict, re-reads, and gets
//! `QuestFull`.
//!
//! [`AttemptLedger::submit`] returns as soon as the attempt is `submitted`.
//! Scoring happens on the settlement queue.

use std::sync::Arc;

use chrono::Utc;

use guild_core::{AttemptId, PartyId, QuestId};
use guild_state::{Attempt, AttemptStatus, NewQuest, Party, Quest, QuestStatus};

use crate::activity::{Activity, ActivityKind};
use crate::engine::MAX_CONFLICT_RETRIES;
use crate::error::LedgerError;
use crate::queue::SettlementQueue;
use crate::store::{LedgerStore, RecordKind, StoreError};

/// Highest `max_attempts` a quest may declare.
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

/// Party, quest and attempt operations.
#[derive(Clone)]
pub struct AttemptLedger {
    store: Arc<dyn LedgerStore>,
    activity: Activity,
    queue: SettlementQueue,
}

impl std::fmt::Debug for AttemptLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptLedger")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl AttemptLedger {
    pub fn new(store: Arc<dyn LedgerStore>, activity: Activity, queue: SettlementQueue) -> Self {
        Self {
            store,
            activity,
            queue,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }

    // ── Parties ───────────────────────────────────────────────────────

    /// Register a party at Bronze with zeroed statistics.
    pub async fn register_party(&self, name: &str) -> Result<Party, LedgerError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::Validation("party name must not be empty".into()));
        }
        let party = Party::register(name, Utc::now());
        self.store.insert_party(&party).await?;
        tracing::info!(party_id = %party.id, name = %party.name, "party registered");
        Ok(party)
    }

    pub async fn party(&self, id: PartyId) -> Result<Party, LedgerError> {
        self.store
            .get_party(id)
            .await?
            .ok_or(LedgerError::PartyNotFound(id))
    }

    /// Parties ordered by RP, then average score, both descending.
    pub async fn leaderboard(&self) -> Result<Vec<Party>, LedgerError> {
        let mut parties = self.store.list_parties().await?;
        parties.sort_by(|a, b| {
            b.rp.cmp(&a.rp)
                .then(b.avg_score.cmp(&a.avg_score))
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(parties)
    }

    // ── Quests ────────────────────────────────────────────────────────

    /// Post a quest in the `open` status.
    pub async fn post_quest(&self, new: NewQuest) -> Result<Quest, LedgerError> {
        if new.title.trim().is_empty() {
            return Err(LedgerError::Validation("title must not be empty".into()));
        }
        if new.gold_reward == 0 {
            return Err(LedgerError::Validation("gold_reward must be positive".into()));
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&new.max_attempts) {
            return Err(LedgerError::Validation(format!(
                "max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}"
            )));
        }
        let quest = Quest::post(new, Utc::now());
        self.store.insert_quest(&quest).await?;
        tracing::info!(
            quest_id = %quest.id,
            difficulty = %quest.difficulty,
            max_attempts = quest.max_attempts,
            "quest posted"
        );
        Ok(quest)
    }

    pub async fn quest(&self, id: QuestId) -> Result<Quest, LedgerError> {
        self.store
            .get_quest(id)
            .await?
            .ok_or(LedgerError::QuestNotFound(id))
    }

    pub async fn quests(&self, status: Option<QuestStatus>) -> Result<Vec<Quest>, LedgerError> {
        Ok(self.store.list_quests(status).await?)
    }

    pub async fn quest_attempts(&self, id: QuestId) -> Result<Vec<Attempt>, LedgerError> {
        self.quest(id).await?;
        Ok(self.store.attempts_for_quest(id).await?)
    }

    // ── Attempts ──────────────────────────────────────────────────────

    pub async fn attempt(&self, id: AttemptId) -> Result<Attempt, LedgerError> {
        self.store
            .get_attempt(id)
            .await?
            .ok_or(LedgerError::AttemptNotFound(id))
    }

    /// Start an attempt of `party_id` at `quest_id`.
    pub async fn accept(&self, quest_id: QuestId, party_id: PartyId) -> Result<Attempt, LedgerError> {
        self.party(party_id).await?;

        let mut last_version = 0;
        for _ in 0..MAX_CONFLICT_RETRIES {
            let mut quest = self.quest(quest_id).await?;
            last_version = quest.version;
            if self.store.find_attempt(quest_id, party_id).await?.is_some() {
                return Err(LedgerError::AlreadyAttempted { quest_id, party_id });
            }
            let existing = self.store.attempts_for_quest(quest_id).await?.len();
            let now = Utc::now();
            quest.admit(existing, now)?;

            let attempt = Attempt::start(quest_id, party_id, now);
            match self.store.admit_attempt(&quest, &attempt).await {
                Ok(()) => {
                    tracing::info!(
                        attempt_id = %attempt.id,
                        quest_id = %quest_id,
                        party_id = %party_id,
                        "quest accepted"
                    );
                    self.activity
                        .emit(ActivityKind::QuestAccepted {
                            quest_id,
                            party_id,
                            attempt_id: attempt.id,
                        })
                        .await;
                    return Ok(attempt);
                }
                Err(StoreError::Duplicate {
                    kind: RecordKind::Attempt,
                    ..
                }) => return Err(LedgerError::AlreadyAttempted { quest_id, party_id }),
                Err(e) if e.is_conflict_on(RecordKind::Quest) => {
                    tracing::debug!(quest_id = %quest_id, "quest changed during accept, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(quest_id = %quest_id, party_id = %party_id, "accept kept conflicting, giving up");
        Err(LedgerError::Store(StoreError::conflict(
            RecordKind::Quest,
            quest_id,
            last_version,
        )))
    }

    /// Record the result of an in-progress attempt and queue it for
    /// settlement.
    pub async fn submit(
        &self,
        quest_id: QuestId,
        party_id: PartyId,
        result_text: String,
        token_count: Option<u64>,
    ) -> Result<Attempt, LedgerError> {
        self.quest(quest_id).await?;
        let no_active = LedgerError::NoActiveAttempt { quest_id, party_id };

        let mut attempt = match self.store.find_attempt(quest_id, party_id).await? {
            Some(a) if a.status == AttemptStatus::InProgress => a,
            _ => return Err(no_active),
        };
        attempt
            .submit(result_text, token_count, Utc::now())
            .map_err(|_| no_active.clone())?;

        match self.store.update_attempt(&attempt).await {
            Ok(()) => attempt.version += 1,
            Err(e) if e.is_conflict_on(RecordKind::Attempt) => return Err(no_active),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            attempt_id = %attempt.id,
            quest_id = %quest_id,
            party_id = %party_id,
            time_taken_seconds = attempt.time_taken_seconds.unwrap_or(0),
            "attempt submitted"
        );
        // Scoring starts before the activity append, which may hit the database.
        self.queue.enqueue(attempt.id);
        self.activity
            .emit(ActivityKind::QuestSubmitted {
                quest_id,
                party_id,
                attempt_id: attempt.id,
                time_taken_seconds: attempt.time_taken_seconds.unwrap_or(0),
            })
            .await;
        Ok(attempt)
    }

    /// Re-queue an attempt that is stuck in `submitted`.
    pub async fn rescore(&self, attempt_id: AttemptId) -> Result<Attempt, LedgerError> {
        let attempt = self.attempt(attempt_id).await?;
        if attempt.status != AttemptStatus::Submitted {
            return Err(LedgerError::NotSubmitted {
                attempt_id,
                status: attempt.status,
            });
        }
        if !self.queue.enqueue(attempt_id) {
            return Err(LedgerError::QueueUnavailable);
        }
        tracing::info!(attempt_id = %attempt_id, "attempt re-queued for scoring");
        Ok(attempt)
    }
}
