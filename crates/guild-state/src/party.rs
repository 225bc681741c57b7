//! # Party Aggregates
//!
//! A party's statistics change only through [`Party::apply_score`], called
//! once per scored attempt. The update is:
//!
//! ```text
//! n            = quests_completed + quests_failed      (before the update)
//! completed/failed += 1                                 (score >= 50 / < 50)
//! avg_score'   = round((avg·n + score) / (n + 1))
//! rp'          = rp + reward.rp
//! gold_earned' = gold_earned + reward.gold
//! rank'        = Rank::for_rp(rp')
//! ```
//!
//! `avg` in the formula is the exact running mean. The party keeps the exact
//! `score_total` alongside the rounded `avg_score`, so `avg_score` always
//! equals `round(mean(all scores))` no matter how many updates accumulate.
//! Rounding is half up.
//!
//! Updates must be serialized per party. Stores enforce that with an
//! optimistic `version` check.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use guild_core::{PartyId, Rank, Reward, Score};

/// An agent or team that attempts quests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub name: String,
    /// Reputation points. Never decreases.
    pub rp: u64,
    pub rank: Rank,
    pub gold_earned: u64,
    pub quests_completed: u64,
    pub quests_failed: u64,
    /// Rounded mean of every resolved attempt score.
    pub avg_score: u8,
    /// Exact sum of every resolved attempt score.
    pub score_total: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped by the store on every write.
    pub version: i64,
}

/// What one scoring event did to a party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreApplication {
    pub score: Score,
    pub reward: Reward,
    /// The attempt counted as completed (score >= 50).
    pub completed: bool,
    pub rank_before: Rank,
    pub rank_after: Rank,
}

impl ScoreApplication {
    /// Whether the event moved the party to a different rank.
    pub fn ranked_up(&self) -> bool {
        self.rank_after != self.rank_before
    }
}

impl Party {
    /// Register a new party with zeroed statistics.
    pub fn register(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PartyId::new(),
            name: name.into(),
            rp: 0,
            rank: Rank::Bronze,
            gold_earned: 0,
            quests_completed: 0,
            quests_failed: 0,
            avg_score: 0,
            score_total: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Number of attempts that have been scored for this party.
    pub fn resolved_count(&self) -> u64 {
        self.quests_completed + self.quests_failed
    }

    /// Fold one scored attempt into the aggregates.
    pub fn apply_score(&mut self, score: Score, reward: Reward, now: DateTime<Utc>) -> ScoreApplication {
        let rank_before = self.rank;
        let completed = score.is_completion();
        if completed {
            self.quests_completed += 1;
        } else {
            self.quests_failed += 1;
        }
        self.score_total += u64::from(score.value());
        self.avg_score = rounded_mean(self.score_total, self.resolved_count());
        self.rp = self.rp.saturating_add(reward.rp);
        self.gold_earned = self.gold_earned.saturating_add(reward.gold);
        self.rank = Rank::for_rp(self.rp);
        self.updated_at = now;

        ScoreApplication {
            score,
            reward,
            completed,
            rank_before,
            rank_after: self.rank,
        }
    }
}

/// `round(total / count)` with half-up rounding, in integer arithmetic.
///
/// Returns 0 when `count` is 0. Scores are at most 100, so the result fits
/// in a `u8`.
pub fn rounded_mean(total: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    ((2 * total + count) / (2 * count)).min(100) as u8
}
