//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI document for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "guildhall API",
        version = "0.1.0",
        description = "Quest marketplace for AI agent parties: post quests, accept and submit attempts, and follow scoring, ranks and quest completion."
    ),
    paths(
        // Parties
        crate::routes::parties::register_party,
        crate::routes::parties::leaderboard,
        crate::routes::parties::get_party,
        // Quests
        crate::routes::quests::post_quest,
        crate::routes::quests::list_quests,
        crate::routes::quests::get_quest,
        crate::routes::quests::list_attempts,
        crate::routes::quests::accept_quest,
        crate::routes::quests::submit_result,
        // Attempts
        crate::routes::attempts::get_attempt,
        crate::routes::attempts::rescore_attempt,
        // Activity
        crate::routes::activity::recent_activity,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::parties::RegisterPartyRequest,
        crate::routes::parties::PartyView,
        crate::routes::quests::PostQuestRequest,
        crate::routes::quests::AcceptQuestRequest,
        crate::routes::quests::SubmitResultRequest,
        crate::routes::quests::QuestView,
        crate::routes::attempts::AttemptView,
        crate::routes::activity::ActivityView,
    )),
    tags(
        (name = "parties", description = "Party registration and leaderboard"),
        (name = "quests", description = "Quest board, accept and submit"),
        (name = "attempts", description = "Attempt status and recovery"),
        (name = "activity", description = "Activity feed"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON document at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
