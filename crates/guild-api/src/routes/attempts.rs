//! # Attempt API
//!
//! Attempt detail (clients poll this for the score) and manual rescore of
//! attempts stuck in `submitted`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::AttemptId;
use guild_state::Attempt;

use crate::error::AppError;
use crate::state::AppState;

/// One party's attempt at one quest.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttemptView {
    pub id: Uuid,
    pub quest_id: Uuid,
    pub party_id: Uuid,
    /// in_progress, submitted, scored, won or lost.
    pub status: String,
    pub result_text: Option<String>,
    pub token_count: Option<u64>,
    pub score: Option<u8>,
    pub feedback: Option<String>,
    pub time_taken_seconds: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub scored_at: Option<DateTime<Utc>>,
}

impl From<Attempt> for AttemptView {
    fn from(a: Attempt) -> Self {
        Self {
            id: *a.id.as_uuid(),
            quest_id: *a.quest_id.as_uuid(),
            party_id: *a.party_id.as_uuid(),
            status: a.status.as_str().to_string(),
            result_text: a.result_text,
            token_count: a.token_count,
            score: a.score.map(|s| s.value()),
            feedback: a.feedback,
            time_taken_seconds: a.time_taken_seconds,
            started_at: a.started_at,
            submitted_at: a.submitted_at,
            scored_at: a.scored_at,
        }
    }
}

/// Build the attempts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/attempts/:id", get(get_attempt))
        .route("/v1/attempts/:id/rescore", post(rescore_attempt))
}

/// GET /v1/attempts/:id: Attempt detail.
#[utoipa::path(
    get,
    path = "/v1/attempts/{id}",
    params(("id" = Uuid, Path, description = "Attempt ID")),
    responses(
        (status = 200, description = "Attempt", body = AttemptView),
        (status = 404, description = "Unknown attempt", body = crate::error::ErrorBody),
    ),
    tag = "attempts"
)]
pub(crate) async fn get_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AttemptView>, AppError> {
    let attempt = state.ledger.attempt(AttemptId::from_uuid(id)).await?;
    Ok(Json(attempt.into()))
}

/// POST /v1/attempts/:id/rescore: Re-enqueue a submitted attempt.
#[utoipa::path(
    post,
    path = "/v1/attempts/{id}/rescore",
    params(("id" = Uuid, Path, description = "Attempt ID")),
    responses(
        (status = 202, description = "Settlement re-enqueued", body = AttemptView),
        (status = 404, description = "Unknown attempt", body = crate::error::ErrorBody),
        (status = 409, description = "Attempt is not submitted", body = crate::error::ErrorBody),
        (status = 503, description = "Settlement queue unavailable", body = crate::error::ErrorBody),
    ),
    tag = "attempts"
)]
pub(crate) async fn rescore_attempt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<AttemptView>), AppError> {
    let attempt = state.ledger.rescore(AttemptId::from_uuid(id)).await?;
    Ok((StatusCode::ACCEPTED, Json(attempt.into())))
}
