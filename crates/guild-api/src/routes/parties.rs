//! # Party API
//!
//! Registration, detail, and the leaderboard.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use guild_core::PartyId;
use guild_state::Party;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, require_text, Validate};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;

/// Request to register a party.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPartyRequest {
    pub name: String,
}

impl Validate for RegisterPartyRequest {
    fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name, MAX_NAME_LEN)
    }
}

/// A party and its running statistics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PartyView {
    pub id: Uuid,
    pub name: String,
    pub rp: u64,
    /// bronze, silver, gold, platinum or adamantite.
    pub rank: String,
    pub gold_earned: u64,
    pub quests_completed: u64,
    pub quests_failed: u64,
    pub avg_score: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Party> for PartyView {
    fn from(p: Party) -> Self {
        Self {
            id: *p.id.as_uuid(),
            name: p.name,
            rp: p.rp,
            rank: p.rank.as_str().to_string(),
            gold_earned: p.gold_earned,
            quests_completed: p.quests_completed,
            quests_failed: p.quests_failed,
            avg_score: p.avg_score,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Build the parties router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/parties", get(leaderboard).post(register_party))
        .route("/v1/parties/:id", get(get_party))
}

/// POST /v1/parties: Register a party.
#[utoipa::path(
    post,
    path = "/v1/parties",
    request_body = RegisterPartyRequest,
    responses(
        (status = 201, description = "Party registered", body = PartyView),
        (status = 422, description = "Invalid name", body = crate::error::ErrorBody),
    ),
    tag = "parties"
)]
pub(crate) async fn register_party(
    State(state): State<AppState>,
    body: Result<Json<RegisterPartyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PartyView>), AppError> {
    let req = extract_validated_json(body)?;
    let party = state.ledger.register_party(&req.name).await?;
    Ok((StatusCode::CREATED, Json(party.into())))
}

/// GET /v1/parties: Leaderboard, highest rp first.
#[utoipa::path(
    get,
    path = "/v1/parties",
    responses(
        (status = 200, description = "Leaderboard", body = Vec<PartyView>),
    ),
    tag = "parties"
)]
pub(crate) async fn leaderboard(
    State(state): State<AppState>,
) -> Result<Json<Vec<PartyView>>, AppError> {
    let parties = state.ledger.leaderboard().await?;
    Ok(Json(parties.into_iter().map(PartyView::from).collect()))
}

/// GET /v1/parties/:id: Party detail.
#[utoipa::path(
    get,
    path = "/v1/parties/{id}",
    params(("id" = Uuid, Path, description = "Party ID")),
    responses(
        (status = 200, description = "Party", body = PartyView),
        (status = 404, description = "Unknown party", body = crate::error::ErrorBody),
    ),
    tag = "parties"
)]
pub(crate) async fn get_party(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PartyView>, AppError> {
    let party = state.ledger.party(PartyId::from_uuid(id)).await?;
    Ok(Json(party.into()))
}
