//! # API Routes
//!
//! | Prefix              | Module          |
//! |---------------------|-----------------|
//! | `/v1/parties/*`     | [`parties`]     |
//! | `/v1/quests/*`      | [`quests`]      |
//! | `/v1/attempts/*`    | [`attempts`]    |
//! | `/v1/activity`      | [`activity`]    |

pub mod activity;
pub mod attempts;
pub mod parties;
pub mod quests;

use axum::Router;

use crate::state::AppState;

/// All `/v1` routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(parties::router())
        .merge(quests::router())
        .merge(attempts::router())
        .merge(activity::router())
}
