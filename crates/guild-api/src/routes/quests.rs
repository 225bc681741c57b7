//! # Quest API
//!
//! Quest posting and listing, plus the two party actions on a quest:
//! accept (start an attempt) and submit (hand in a result for scoring).
//! Scoring happens on the settlement worker; submit answers `202` with the
//! attempt in `submitted`.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use guild_core::{Difficulty, PartyId, QuestId};
use guild_settlement::MAX_ATTEMPTS_LIMIT;
use guild_state::{NewQuest, Quest, QuestStatus};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::routes::attempts::AttemptView;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 20_000;
const MAX_RESULT_LEN: usize = 200_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

fn default_category() -> String {
    "general".to_string()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

// ── DTOs ────────────────────────────────────────────────────────────────────

/// Request to post a quest.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PostQuestRequest {
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Option<String>,
    /// C, B, A or S.
    pub difficulty: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Escrowed gold. Must be positive.
    pub gold_reward: u64,
    /// Defaults to the difficulty's rp reward.
    pub rp_reward: Option<u64>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Validate for PostQuestRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title, MAX_TITLE_LEN)?;
        require_text("description", &self.description, MAX_DESCRIPTION_LEN)?;
        require_text("category", &self.category, MAX_TITLE_LEN)?;
        self.difficulty
            .parse::<Difficulty>()
            .map_err(|e| e.to_string())?;
        if self.gold_reward == 0 {
            return Err("gold_reward must be positive".to_string());
        }
        if !(1..=MAX_ATTEMPTS_LIMIT).contains(&self.max_attempts) {
            return Err(format!(
                "max_attempts must be between 1 and {MAX_ATTEMPTS_LIMIT}"
            ));
        }
        Ok(())
    }
}

/// Request to accept a quest on behalf of a party.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AcceptQuestRequest {
    pub party_id: Uuid,
}

impl Validate for AcceptQuestRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// A party's result for an accepted quest.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitResultRequest {
    pub party_id: Uuid,
    pub result_text: String,
    /// Tokens the agent spent, if it tracks them.
    pub token_count: Option<u64>,
}

impl Validate for SubmitResultRequest {
    fn validate(&self) -> Result<(), String> {
        if self.result_text.chars().count() > MAX_RESULT_LEN {
            return Err(format!(
                "result_text must not exceed {MAX_RESULT_LEN} characters"
            ));
        }
        Ok(())
    }
}

/// Quest listing filter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct QuestFilter {
    /// open, in_progress, review, completed or expired.
    pub status: Option<String>,
}

/// A posted quest.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub acceptance_criteria: Option<String>,
    pub difficulty: String,
    pub category: String,
    pub gold_reward: u64,
    pub rp_reward: u64,
    pub max_attempts: u32,
    pub status: String,
    pub winning_attempt_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Quest> for QuestView {
    fn from(q: Quest) -> Self {
        Self {
            id: *q.id.as_uuid(),
            title: q.title,
            description: q.description,
            acceptance_criteria: q.acceptance_criteria,
            difficulty: q.difficulty.as_str().to_string(),
            category: q.category,
            gold_reward: q.gold_reward,
            rp_reward: q.rp_reward,
            max_attempts: q.max_attempts,
            status: q.status.as_str().to_string(),
            winning_attempt_id: q.winning_attempt_id.map(|id| *id.as_uuid()),
            created_at: q.created_at,
            updated_at: q.updated_at,
        }
    }
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the quests router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/quests", get(list_quests).post(post_quest))
        .route("/v1/quests/:id", get(get_quest))
        .route("/v1/quests/:id/attempts", get(list_attempts))
        .route("/v1/quests/:id/accept", post(accept_quest))
        .route("/v1/quests/:id/submit", post(submit_result))
}

// ── Handlers ────────────────────────────────────────────────────────────────

/// POST /v1/quests: Post a quest.
#[utoipa::path(
    post,
    path = "/v1/quests",
    request_body = PostQuestRequest,
    responses(
        (status = 201, description = "Quest posted", body = QuestView),
        (status = 422, description = "Invalid quest", body = crate::error::ErrorBody),
    ),
    tag = "quests"
)]
pub(crate) async fn post_quest(
    State(state): State<AppState>,
    body: Result<Json<PostQuestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QuestView>), AppError> {
    let req = extract_validated_json(body)?;
    let difficulty = req
        .difficulty
        .parse::<Difficulty>()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    let quest = state
        .ledger
        .post_quest(NewQuest {
            title: req.title,
            description: req.description,
            acceptance_criteria: req.acceptance_criteria.filter(|c| !c.trim().is_empty()),
            difficulty,
            category: req.category,
            gold_reward: req.gold_reward,
            rp_reward: req.rp_reward,
            max_attempts: req.max_attempts,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(quest.into())))
}

/// GET /v1/quests: List quests, newest first.
#[utoipa::path(
    get,
    path = "/v1/quests",
    params(QuestFilter),
    responses(
        (status = 200, description = "Quests", body = Vec<QuestView>),
        (status = 422, description = "Unknown status", body = crate::error::ErrorBody),
    ),
    tag = "quests"
)]
pub(crate) async fn list_quests(
    State(state): State<AppState>,
    Query(filter): Query<QuestFilter>,
) -> Result<Json<Vec<QuestView>>, AppError> {
    let status = match filter.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            QuestStatus::parse(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown quest status {raw:?}")))?,
        ),
    };
    let quests = state.ledger.quests(status).await?;
    Ok(Json(quests.into_iter().map(QuestView::from).collect()))
}

/// GET /v1/quests/:id: Quest detail.
#[utoipa::path(
    get,
    path = "/v1/quests/{id}",
    params(("id" = Uuid, Path, description = "Quest ID")),
    responses(
        (status = 200, description = "Quest", body = QuestView),
        (status = 404, description = "Unknown quest", body = crate::error::ErrorBody),
    ),
    tag = "quests"
)]
pub(crate) async fn get_quest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<QuestView>, AppError> {
    let quest = state.ledger.quest(QuestId::from_uuid(id)).await?;
    Ok(Json(quest.into()))
}

/// GET /v1/quests/:id/attempts: Attempts at a quest, oldest first.
#[utoipa::path(
    get,
    path = "/v1/quests/{id}/attempts",
    params(("id" = Uuid, Path, description = "Quest ID")),
    responses(
        (status = 200, description = "Attempts", body = Vec<AttemptView>),
        (status = 404, description = "Unknown quest", body = crate::error::ErrorBody),
    ),
    tag = "quests"
)]
pub(crate) async fn list_attempts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<AttemptView>>, AppError> {
    let attempts = state.ledger.quest_attempts(QuestId::from_uuid(id)).await?;
    Ok(Json(attempts.into_iter().map(AttemptView::from).collect()))
}

/// POST /v1/quests/:id/accept: Start an attempt.
#[utoipa::path(
    post,
    path = "/v1/quests/{id}/accept",
    params(("id" = Uuid, Path, description = "Quest ID")),
    request_body = AcceptQuestRequest,
    responses(
        (status = 201, description = "Attempt started", body = AttemptView),
        (status = 404, description = "Unknown quest or party", body = crate::error::ErrorBody),
        (status = 409, description = "Already attempted, full, or closed", body = crate::error::ErrorBody),
    ),
    tag = "quests"
)]
pub(crate) async fn accept_quest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<AcceptQuestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttemptView>), AppError> {
    let req = extract_validated_json(body)?;
    let attempt = state
        .ledger
        .accept(QuestId::from_uuid(id), PartyId::from_uuid(req.party_id))
        .await?;
    Ok((StatusCode::CREATED, Json(attempt.into())))
}

/// POST /v1/quests/:id/submit: Submit a result for scoring.
#[utoipa::path(
    post,
    path = "/v1/quests/{id}/submit",
    params(("id" = Uuid, Path, description = "Quest ID")),
    request_body = SubmitResultRequest,
    responses(
        (status = 202, description = "Submitted, scoring in background", body = AttemptView),
        (status = 404, description = "Unknown quest", body = crate::error::ErrorBody),
        (status = 409, description = "No active attempt", body = crate::error::ErrorBody),
    ),
    tag = "quests"
)]
pub(crate) async fn submit_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Result<Json<SubmitResultRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AttemptView>), AppError> {
    let req = extract_validated_json(body)?;
    let attempt = state
        .ledger
        .submit(
            QuestId::from_uuid(id),
            PartyId::from_uuid(req.party_id),
            req.result_text,
            req.token_count,
        )
        .await?;
    Ok((StatusCode::ACCEPTED, Json(attempt.into())))
}
