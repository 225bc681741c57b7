//! # Settlement Engine
//!
//! Settles one submitted attempt:
//!
//! ```text
//! 1. score      ResilientOracle (never fails)
//! 2. persist    attempt → scored            ┐ one atomic commit_score
//! 3. aggregate  party counters, avg, rp     ┘ retried on party conflict
//! 4. close      all attempts resolved → pick winner, quest → completed
//! ```
//!
//! ## Concurrency
//!
//! Party updates are compare-and-swap on the party version. A conflict means
//! another settlement for the same party landed first, so the aggregate is
//! rebuilt from a fresh snapshot and retried, up to
//! [`MAX_CONFLICT_RETRIES`] times. A conflict on the attempt itself means a
//! concurrent settlement already scored it, and this one stops.
//!
//! Winner selection is compare-and-swap on the quest version. Every accept
//! bumps that version too, so a late accept invalidates a stale "nothing
//! pending" read and the selection re-evaluates.
//!
//! Rewards are paid per attempt at scoring time to every attempt at or above
//! the win threshold. Selecting the winner moves no RP or gold.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use guild_core::{AttemptId, PartyId, QuestId, Reward, Score};
use guild_oracle::{ResilientOracle, ScoringRequest, Verdict};
use guild_state::{Attempt, AttemptStatus, Party, Quest, ScoreApplication};

use crate::activity::{Activity, ActivityKind};
use crate::error::SettlementError;
use crate::store::{LedgerStore, RecordKind, StoreError};

/// Compare-and-swap attempts before a write is reported as exhausted.
pub const MAX_CONFLICT_RETRIES: u32 = 5;

/// Outcome of closing a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestClosure {
    pub quest_id: QuestId,
    pub winning_attempt_id: AttemptId,
    pub winning_party_id: PartyId,
    pub winning_score: Score,
    pub losing_attempt_ids: Vec<AttemptId>,
}

/// Everything one settlement did.
#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    /// The attempt as committed (scored).
    pub attempt: Attempt,
    pub verdict: Verdict,
    /// The party after the aggregate update.
    pub party: Party,
    pub application: ScoreApplication,
    /// Set when this settlement closed the quest.
    pub closure: Option<QuestClosure>,
}

/// Scores submitted attempts and settles quests.
pub struct SettlementEngine {
    store: Arc<dyn LedgerStore>,
    oracle: ResilientOracle,
    activity: Activity,
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("oracle", &self.oracle)
            .finish_non_exhaustive()
    }
}

impl SettlementEngine {
    pub fn new(store: Arc<dyn LedgerStore>, oracle: ResilientOracle, activity: Activity) -> Self {
        Self {
            store,
            oracle,
            activity,
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Score a submitted attempt, update its party, and close the quest if
    /// this was the last outstanding attempt.
    pub async fn settle(&self, attempt_id: AttemptId) -> Result<SettlementReport, SettlementError> {
        let attempt = self
            .store
            .get_attempt(attempt_id)
            .await?
            .ok_or(SettlementError::AttemptNotFound(attempt_id))?;
        if attempt.status != AttemptStatus::Submitted {
            return Err(SettlementError::NotSubmitted {
                attempt_id,
                status: attempt.status,
            });
        }
        let quest = self
            .store
            .get_quest(attempt.quest_id)
            .await?
            .ok_or(SettlementError::QuestNotFound(attempt.quest_id))?;

        let verdict = self.oracle.score(&scoring_request(&quest, &attempt)).await;
        let reward = Reward::earned(quest.difficulty, verdict.score);

        let mut scored = attempt.clone();
        scored.record_score(verdict.score, verdict.feedback.clone(), Utc::now())?;

        let (party, application) = self.commit_with_retry(&scored, reward).await?;
        scored.version += 1;

        tracing::info!(
            attempt_id = %scored.id,
            quest_id = %quest.id,
            party_id = %party.id,
            score = verdict.score.value(),
            source = %verdict.source,
            rp = party.rp,
            "attempt scored"
        );

        self.activity
            .emit(ActivityKind::QuestScored {
                quest_id: quest.id,
                party_id: party.id,
                attempt_id: scored.id,
                score: verdict.score,
                source: verdict.source,
            })
            .await;
        if application.ranked_up() {
            self.activity
                .emit(ActivityKind::RankUp {
                    party_id: party.id,
                    from: application.rank_before,
                    to: application.rank_after,
                })
                .await;
        }

        // The score is durable at this point; a failed close is re-attempted
        // by the next settlement on the quest.
        let closure = match self.select_winner(quest.id).await {
            Ok(closure) => closure,
            Err(e) => {
                tracing::warn!(quest_id = %quest.id, error = %e, "winner selection failed");
                None
            }
        };

        Ok(SettlementReport {
            attempt: scored,
            verdict,
            party,
            application,
            closure,
        })
    }

    async fn commit_with_retry(
        &self,
        scored: &Attempt,
        reward: Reward,
    ) -> Result<(Party, ScoreApplication), SettlementError> {
        let score = scored.score.ok_or(SettlementError::NotSubmitted {
            attempt_id: scored.id,
            status: scored.status,
        })?;

        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut party = self
                .store
                .get_party(scored.party_id)
                .await?
                .ok_or(SettlementError::PartyNotFound(scored.party_id))?;
            let application = party.apply_score(score, reward, Utc::now());

            match self.store.commit_score(scored, &party).await {
                Ok(()) => {
                    party.version += 1;
                    return Ok((party, application));
                }
                Err(e) if e.is_conflict_on(RecordKind::Party) => {
                    tracing::debug!(
                        party_id = %scored.party_id,
                        attempt,
                        "party aggregate conflict, retrying with fresh snapshot"
                    );
                }
                Err(e) if e.is_conflict_on(RecordKind::Attempt) => {
                    let status = self
                        .store
                        .get_attempt(scored.id)
                        .await?
                        .map_or(AttemptStatus::Submitted, |a| a.status);
                    return Err(SettlementError::NotSubmitted {
                        attempt_id: scored.id,
                        status,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            party_id = %scored.party_id,
            attempt_id = %scored.id,
            retries = MAX_CONFLICT_RETRIES,
            "FATAL: party aggregate update kept conflicting; attempt left submitted, manual reconciliation required"
        );
        Err(SettlementError::RetriesExhausted {
            record: format!("party {}", scored.party_id),
            attempts: MAX_CONFLICT_RETRIES,
        })
    }

    /// Close the quest if every attempt has resolved.
    ///
    /// Returns `None` when the quest is already completed, still has pending
    /// attempts, or has no scored attempt. Safe to call any number of times.
    pub async fn select_winner(
        &self,
        quest_id: QuestId,
    ) -> Result<Option<QuestClosure>, SettlementError> {
        for attempt in 1..=MAX_CONFLICT_RETRIES {
            let mut quest = self
                .store
                .get_quest(quest_id)
                .await?
                .ok_or(SettlementError::QuestNotFound(quest_id))?;
            if quest.is_completed() {
                return Ok(None);
            }

            let attempts = self.store.attempts_for_quest(quest_id).await?;
            if attempts.iter().any(|a| a.status.is_pending()) {
                return Ok(None);
            }
            let mut scored: Vec<Attempt> = attempts
                .into_iter()
                .filter(|a| a.status == AttemptStatus::Scored)
                .collect();
            let Some((winner_id, winning_score)) = pick_winner(&scored) else {
                return Ok(None);
            };

            quest.complete(winner_id, Utc::now())?;
            let mut closure = None;
            for a in scored.iter_mut() {
                if a.id == winner_id {
                    a.mark_won()?;
                    closure = Some(QuestClosure {
                        quest_id,
                        winning_attempt_id: a.id,
                        winning_party_id: a.party_id,
                        winning_score,
                        losing_attempt_ids: Vec::new(),
                    });
                } else {
                    a.mark_lost()?;
                }
            }
            let Some(mut closure) = closure else {
                return Ok(None);
            };
            closure.losing_attempt_ids = scored
                .iter()
                .filter(|a| a.status == AttemptStatus::Lost)
                .map(|a| a.id)
                .collect();

            match self.store.close_quest(&quest, &scored).await {
                Ok(()) => {
                    tracing::info!(
                        quest_id = %quest_id,
                        winning_attempt_id = %closure.winning_attempt_id,
                        winning_party_id = %closure.winning_party_id,
                        score = closure.winning_score.value(),
                        losers = closure.losing_attempt_ids.len(),
                        "quest completed"
                    );
                    self.activity
                        .emit(ActivityKind::QuestCompleted {
                            quest_id,
                            winning_attempt_id: closure.winning_attempt_id,
                            winning_party_id: closure.winning_party_id,
                            score: closure.winning_score,
                        })
                        .await;
                    return Ok(Some(closure));
                }
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(
                        quest_id = %quest_id,
                        attempt,
                        "quest changed during winner selection, re-evaluating"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::error!(
            quest_id = %quest_id,
            retries = MAX_CONFLICT_RETRIES,
            "FATAL: winner selection kept conflicting; quest left open, manual reconciliation required"
        );
        Err(SettlementError::RetriesExhausted {
            record: format!("quest {quest_id}"),
            attempts: MAX_CONFLICT_RETRIES,
        })
    }
}

/// Highest score wins. Ties go to the earliest scored, then the earliest
/// started, then the lowest id.
pub fn pick_winner(scored: &[Attempt]) -> Option<(AttemptId, Score)> {
    scored
        .iter()
        .filter_map(|a| a.score.map(|s| (a, s)))
        .min_by_key(|(a, score)| (Reverse(*score), a.scored_at, a.started_at, a.id))
        .map(|(a, score)| (a.id, score))
}

fn scoring_request(quest: &Quest, attempt: &Attempt) -> ScoringRequest {
    ScoringRequest {
        quest_title: quest.title.clone(),
        quest_description: quest.description.clone(),
        acceptance_criteria: quest.acceptance_criteria.clone(),
        difficulty: quest.difficulty,
        result_text: attempt.result().to_string(),
    }
}
