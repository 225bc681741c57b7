//! Postgres-backed [`LedgerStore`] and [`ActivityLog`].
//!
//! Every compound write runs in one transaction. Updates are conditional on
//! the row's `version` (`... WHERE id = $n AND version = $m`), and bump it;
//! zero affected rows means another writer got there first. The unique
//! constraint on `(quest_id, party_id)` backs the one-attempt-per-party rule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use guild_core::{AttemptId, Difficulty, PartyId, QuestId, Rank, Score};
use guild_settlement::{ActivityEvent, ActivityLog, LedgerStore, RecordKind, StoreError};
use guild_state::{Attempt, AttemptStatus, Party, Quest, QuestStatus};

const PARTY_COLUMNS: &str = "id, name, rp, rank, gold_earned, quests_completed, quests_failed, \
     avg_score, score_total, created_at, updated_at, version";

const QUEST_COLUMNS: &str = "id, title, description, acceptance_criteria, difficulty, category, \
     gold_reward, rp_reward, max_attempts, status, winning_attempt_id, created_at, updated_at, version";

const ATTEMPT_COLUMNS: &str = "id, quest_id, party_id, status, result_text, token_count, score, \
     feedback, time_taken_seconds, started_at, submitted_at, scored_at, version";

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn corrupt(kind: RecordKind, id: Uuid, detail: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(format!("corrupt {kind} row {id}: {detail}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn signed(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

fn unsigned(kind: RecordKind, id: Uuid, column: &str, v: i64) -> Result<u64, StoreError> {
    u64::try_from(v).map_err(|_| corrupt(kind, id, format!("negative {column} {v}")))
}

// ── Ledger store ──────────────────────────────────────────────────────────

/// Ledger persistence over a Postgres pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map a zero-row conditional update to `NotFound` or `Conflict`.
async fn missed_update(
    conn: &mut PgConnection,
    kind: RecordKind,
    table: &str,
    id: Uuid,
    expected_version: i64,
) -> StoreError {
    let sql = format!("SELECT 1 FROM {table} WHERE id = $1");
    match sqlx::query(&sql).bind(id).fetch_optional(&mut *conn).await {
        Ok(Some(_)) => StoreError::conflict(kind, id, expected_version),
        Ok(None) => StoreError::not_found(kind, id),
        Err(e) => backend(e),
    }
}

async fn update_quest(conn: &mut PgConnection, quest: &Quest) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE quests SET status = $1, winning_attempt_id = $2, updated_at = $3, \
         version = version + 1 WHERE id = $4 AND version = $5",
    )
    .bind(quest.status.as_str())
    .bind(quest.winning_attempt_id.map(|id| *id.as_uuid()))
    .bind(quest.updated_at)
    .bind(quest.id.as_uuid())
    .bind(quest.version)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;

    if result.rows_affected() == 0 {
        return Err(missed_update(
            conn,
            RecordKind::Quest,
            "quests",
            *quest.id.as_uuid(),
            quest.version,
        )
        .await);
    }
    Ok(())
}

async fn update_party(conn: &mut PgConnection, party: &Party) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE parties SET rp = $1, rank = $2, gold_earned = $3, quests_completed = $4, \
         quests_failed = $5, avg_score = $6, score_total = $7, updated_at = $8, \
         version = version + 1 WHERE id = $9 AND version = $10",
    )
    .bind(signed(party.rp))
    .bind(party.rank.as_str())
    .bind(signed(party.gold_earned))
    .bind(signed(party.quests_completed))
    .bind(signed(party.quests_failed))
    .bind(i16::from(party.avg_score))
    .bind(signed(party.score_total))
    .bind(party.updated_at)
    .bind(party.id.as_uuid())
    .bind(party.version)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;

    if result.rows_affected() == 0 {
        return Err(missed_update(
            conn,
            RecordKind::Party,
            "parties",
            *party.id.as_uuid(),
            party.version,
        )
        .await);
    }
    Ok(())
}

async fn update_attempt(conn: &mut PgConnection, attempt: &Attempt) -> Result<(), StoreError> {
    let result = sqlx::query(
        "UPDATE quest_attempts SET status = $1, result_text = $2, token_count = $3, score = $4, \
         feedback = $5, time_taken_seconds = $6, submitted_at = $7, scored_at = $8, \
         version = version + 1 WHERE id = $9 AND version = $10",
    )
    .bind(attempt.status.as_str())
    .bind(attempt.result_text.as_deref())
    .bind(attempt.token_count.map(signed))
    .bind(attempt.score.map(|s| i16::from(s.value())))
    .bind(attempt.feedback.as_deref())
    .bind(attempt.time_taken_seconds.map(signed))
    .bind(attempt.submitted_at)
    .bind(attempt.scored_at)
    .bind(attempt.id.as_uuid())
    .bind(attempt.version)
    .execute(&mut *conn)
    .await
    .map_err(backend)?;

    if result.rows_affected() == 0 {
        return Err(missed_update(
            conn,
            RecordKind::Attempt,
            "quest_attempts",
            *attempt.id.as_uuid(),
            attempt.version,
        )
        .await);
    }
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn insert_party(&self, party: &Party) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO parties ({PARTY_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        );
        sqlx::query(&sql)
            .bind(party.id.as_uuid())
            .bind(&party.name)
            .bind(signed(party.rp))
            .bind(party.rank.as_str())
            .bind(signed(party.gold_earned))
            .bind(signed(party.quests_completed))
            .bind(signed(party.quests_failed))
            .bind(i16::from(party.avg_score))
            .bind(signed(party.score_total))
            .bind(party.created_at)
            .bind(party.updated_at)
            .bind(party.version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate {
                        kind: RecordKind::Party,
                        detail: party.id.to_string(),
                    }
                } else {
                    backend(e)
                }
            })?;
        Ok(())
    }

    async fn get_party(&self, id: PartyId) -> Result<Option<Party>, StoreError> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties WHERE id = $1");
        let row = sqlx::query_as::<_, PartyRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(PartyRow::into_record).transpose()
    }

    async fn list_parties(&self) -> Result<Vec<Party>, StoreError> {
        let sql = format!("SELECT {PARTY_COLUMNS} FROM parties");
        let rows = sqlx::query_as::<_, PartyRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(PartyRow::into_record).collect()
    }

    async fn insert_quest(&self, quest: &Quest) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO quests ({QUEST_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        );
        sqlx::query(&sql)
            .bind(quest.id.as_uuid())
            .bind(&quest.title)
            .bind(&quest.description)
            .bind(quest.acceptance_criteria.as_deref())
            .bind(quest.difficulty.as_str())
            .bind(&quest.category)
            .bind(signed(quest.gold_reward))
            .bind(signed(quest.rp_reward))
            .bind(i32::try_from(quest.max_attempts).unwrap_or(i32::MAX))
            .bind(quest.status.as_str())
            .bind(quest.winning_attempt_id.map(|id| *id.as_uuid()))
            .bind(quest.created_at)
            .bind(quest.updated_at)
            .bind(quest.version)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate {
                        kind: RecordKind::Quest,
                        detail: quest.id.to_string(),
                    }
                } else {
                    backend(e)
                }
            })?;
        Ok(())
    }

    async fn get_quest(&self, id: QuestId) -> Result<Option<Quest>, StoreError> {
        let sql = format!("SELECT {QUEST_COLUMNS} FROM quests WHERE id = $1");
        let row = sqlx::query_as::<_, QuestRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(QuestRow::into_record).transpose()
    }

    async fn list_quests(&self, status: Option<QuestStatus>) -> Result<Vec<Quest>, StoreError> {
        let sql = format!(
            "SELECT {QUEST_COLUMNS} FROM quests \
             WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC, id"
        );
        let rows = sqlx::query_as::<_, QuestRow>(&sql)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(QuestRow::into_record).collect()
    }

    async fn get_attempt(&self, id: AttemptId) -> Result<Option<Attempt>, StoreError> {
        let sql = format!("SELECT {ATTEMPT_COLUMNS} FROM quest_attempts WHERE id = $1");
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(AttemptRow::into_record).transpose()
    }

    async fn find_attempt(
        &self,
        quest: QuestId,
        party: PartyId,
    ) -> Result<Option<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quest_attempts WHERE quest_id = $1 AND party_id = $2"
        );
        let row = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(quest.as_uuid())
            .bind(party.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(AttemptRow::into_record).transpose()
    }

    async fn attempts_for_quest(&self, quest: QuestId) -> Result<Vec<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quest_attempts WHERE quest_id = $1 \
             ORDER BY started_at, id"
        );
        let rows = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(quest.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(AttemptRow::into_record).collect()
    }

    async fn attempts_with_status(
        &self,
        status: AttemptStatus,
    ) -> Result<Vec<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {ATTEMPT_COLUMNS} FROM quest_attempts WHERE status = $1 \
             ORDER BY started_at, id"
        );
        let rows = sqlx::query_as::<_, AttemptRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.into_iter().map(AttemptRow::into_record).collect()
    }

    async fn admit_attempt(&self, quest: &Quest, attempt: &Attempt) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        update_quest(&mut tx, quest).await?;

        let sql = format!(
            "INSERT INTO quest_attempts ({ATTEMPT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        );
        sqlx::query(&sql)
            .bind(attempt.id.as_uuid())
            .bind(attempt.quest_id.as_uuid())
            .bind(attempt.party_id.as_uuid())
            .bind(attempt.status.as_str())
            .bind(attempt.result_text.as_deref())
            .bind(attempt.token_count.map(signed))
            .bind(attempt.score.map(|s| i16::from(s.value())))
            .bind(attempt.feedback.as_deref())
            .bind(attempt.time_taken_seconds.map(signed))
            .bind(attempt.started_at)
            .bind(attempt.submitted_at)
            .bind(attempt.scored_at)
            .bind(attempt.version)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Duplicate {
                        kind: RecordKind::Attempt,
                        detail: format!("quest {} party {}", attempt.quest_id, attempt.party_id),
                    }
                } else {
                    backend(e)
                }
            })?;

        tx.commit().await.map_err(backend)
    }

    async fn update_attempt(&self, attempt: &Attempt) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(backend)?;
        update_attempt(&mut conn, attempt).await
    }

    async fn commit_score(&self, attempt: &Attempt, party: &Party) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        update_attempt(&mut tx, attempt).await?;
        update_party(&mut tx, party).await?;
        tx.commit().await.map_err(backend)
    }

    async fn close_quest(&self, quest: &Quest, attempts: &[Attempt]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        update_quest(&mut tx, quest).await?;
        for attempt in attempts {
            update_attempt(&mut tx, attempt).await?;
        }
        tx.commit().await.map_err(backend)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(backend)
    }
}

// ── Activity log ──────────────────────────────────────────────────────────

/// Activity feed stored in the `activity_log` table.
#[derive(Debug, Clone)]
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityLog for PgActivityLog {
    async fn append(&self, event: &ActivityEvent) -> Result<(), StoreError> {
        let payload = serde_json::to_value(event)
            .map_err(|e| StoreError::Backend(format!("failed to serialize activity event: {e}")))?;
        sqlx::query("INSERT INTO activity_log (kind, payload, occurred_at) VALUES ($1, $2, $3)")
            .bind(event.kind.as_str())
            .bind(payload)
            .bind(event.at)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEvent>, StoreError> {
        let rows: Vec<(i64, serde_json::Value)> =
            sqlx::query_as("SELECT id, payload FROM activity_log ORDER BY id DESC LIMIT $1")
                .bind(signed(limit as u64))
                .fetch_all(&self.pool)
                .await
                .map_err(backend)?;

        Ok(rows
            .into_iter()
            .filter_map(|(id, payload)| match serde_json::from_value(payload) {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(id, error = %e, "skipping unreadable activity row");
                    None
                }
            })
            .collect())
    }
}

// ── Row types ─────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct PartyRow {
    id: Uuid,
    name: String,
    rp: i64,
    rank: String,
    gold_earned: i64,
    quests_completed: i64,
    quests_failed: i64,
    avg_score: i16,
    score_total: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl PartyRow {
    fn into_record(self) -> Result<Party, StoreError> {
        let rank: Rank = self
            .rank
            .parse()
            .map_err(|e| corrupt(RecordKind::Party, self.id, e))?;
        let avg_score =
            u8::try_from(self.avg_score).map_err(|e| corrupt(RecordKind::Party, self.id, e))?;
        Ok(Party {
            id: PartyId::from_uuid(self.id),
            name: self.name,
            rp: unsigned(RecordKind::Party, self.id, "rp", self.rp)?,
            rank,
            gold_earned: unsigned(RecordKind::Party, self.id, "gold_earned", self.gold_earned)?,
            quests_completed: unsigned(RecordKind::Party, self.id, "quests_completed", self.quests_completed)?,
            quests_failed: unsigned(RecordKind::Party, self.id, "quests_failed", self.quests_failed)?,
            avg_score,
            score_total: unsigned(RecordKind::Party, self.id, "score_total", self.score_total)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct QuestRow {
    id: Uuid,
    title: String,
    description: String,
    acceptance_criteria: Option<String>,
    difficulty: String,
    category: String,
    gold_reward: i64,
    rp_reward: i64,
    max_attempts: i32,
    status: String,
    winning_attempt_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl QuestRow {
    fn into_record(self) -> Result<Quest, StoreError> {
        let difficulty: Difficulty = self
            .difficulty
            .parse()
            .map_err(|e| corrupt(RecordKind::Quest, self.id, e))?;
        let status = QuestStatus::parse(&self.status).ok_or_else(|| {
            corrupt(RecordKind::Quest, self.id, format!("status {:?}", self.status))
        })?;
        let max_attempts =
            u32::try_from(self.max_attempts).map_err(|e| corrupt(RecordKind::Quest, self.id, e))?;
        Ok(Quest {
            id: QuestId::from_uuid(self.id),
            title: self.title,
            description: self.description,
            acceptance_criteria: self.acceptance_criteria,
            difficulty,
            category: self.category,
            gold_reward: unsigned(RecordKind::Quest, self.id, "gold_reward", self.gold_reward)?,
            rp_reward: unsigned(RecordKind::Quest, self.id, "rp_reward", self.rp_reward)?,
            max_attempts,
            status,
            winning_attempt_id: self.winning_attempt_id.map(AttemptId::from_uuid),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: Uuid,
    quest_id: Uuid,
    party_id: Uuid,
    status: String,
    result_text: Option<String>,
    token_count: Option<i64>,
    score: Option<i16>,
    feedback: Option<String>,
    time_taken_seconds: Option<i64>,
    started_at: DateTime<Utc>,
    submitted_at: Option<DateTime<Utc>>,
    scored_at: Option<DateTime<Utc>>,
    version: i64,
}

impl AttemptRow {
    fn into_record(self) -> Result<Attempt, StoreError> {
        let status = AttemptStatus::parse(&self.status).ok_or_else(|| {
            corrupt(RecordKind::Attempt, self.id, format!("status {:?}", self.status))
        })?;
        let score = self
            .score
            .map(|s| Score::new(i64::from(s)))
            .transpose()
            .map_err(|e| corrupt(RecordKind::Attempt, self.id, e))?;
        let token_count = self
            .token_count
            .map(|v| unsigned(RecordKind::Attempt, self.id, "token_count", v))
            .transpose()?;
        let time_taken_seconds = self
            .time_taken_seconds
            .map(|v| unsigned(RecordKind::Attempt, self.id, "time_taken_seconds", v))
            .transpose()?;
        Ok(Attempt {
            id: AttemptId::from_uuid(self.id),
            quest_id: QuestId::from_uuid(self.quest_id),
            party_id: PartyId::from_uuid(self.party_id),
            status,
            result_text: self.result_text,
            token_count,
            score,
            feedback: self.feedback,
            time_taken_seconds,
            started_at: self.started_at,
            submitted_at: self.submitted_at,
            scored_at: self.scored_at,
            version: self.version,
        })
    }
}
