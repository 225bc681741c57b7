//! # Activity Feed API

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use guild_settlement::ActivityEvent;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActivityQuery {
    /// Number of events, 1 to 500. Defaults to 50.
    pub limit: Option<usize>,
}

/// One activity feed entry.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActivityView {
    pub at: DateTime<Utc>,
    /// quest_accepted, quest_submitted, quest_scored, rank_up or quest_completed.
    pub kind: String,
    /// Event-specific fields.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

impl From<ActivityEvent> for ActivityView {
    fn from(event: ActivityEvent) -> Self {
        let mut data = serde_json::to_value(&event.kind).unwrap_or_default();
        if let Some(fields) = data.as_object_mut() {
            fields.remove("kind");
        }
        Self {
            at: event.at,
            kind: event.kind.as_str().to_string(),
            data,
        }
    }
}

/// Build the activity router.
pub fn router() -> Router<AppState> {
    Router::new().route("/v1/activity", get(recent_activity))
}

/// GET /v1/activity: Most recent events, newest first.
#[utoipa::path(
    get,
    path = "/v1/activity",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Activity feed", body = Vec<ActivityView>),
        (status = 422, description = "Invalid limit", body = crate::error::ErrorBody),
    ),
    tag = "activity"
)]
pub(crate) async fn recent_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityView>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_LIMIT}"
        )));
    }
    let events = state.ledger.activity().recent(limit).await;
    Ok(Json(events.into_iter().map(ActivityView::from).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_core::{PartyId, Rank};
    use guild_settlement::ActivityKind;

    #[test]
    fn view_splits_kind_from_fields() {
        let party_id = PartyId::new();
        let view = ActivityView::from(ActivityEvent::now(ActivityKind::RankUp {
            party_id,
            from: Rank::Bronze,
            to: Rank::Silver,
        }));
        assert_eq!(view.kind, "rank_up");
        assert_eq!(view.data["to"], "silver");
        assert_eq!(view.data["party_id"], party_id.to_string());
        assert!(view.data.get("kind").is_none());
    }
}
