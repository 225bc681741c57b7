//! # guild-api: HTTP Service for guildhall
//!
//! Exposes the attempt ledger over Axum. Scoring and winner selection run
//! on the background settlement worker owned by [`state::AppState`].
//!
//! ## API Surface
//!
//! | Prefix              | Module                  | Domain             |
//! |---------------------|-------------------------|--------------------|
//! | `/v1/parties/*`     | [`routes::parties`]     | Parties, leaderboard |
//! | `/v1/quests/*`      | [`routes::quests`]      | Quest board, accept, submit |
//! | `/v1/attempts/*`    | [`routes::attempts`]    | Attempt status, rescore |
//! | `/v1/activity`      | [`routes::activity`]    | Activity feed      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health checks, `/metrics` and `/openapi.json` are unauthenticated.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use std::collections::HashMap;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use guild_state::QuestStatus;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();
    let metrics_on = state.config.metrics_enabled;

    // Body size limit: 1 MiB, enough for the largest accepted result text.
    let mut api = routes::router()
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(from_fn(auth::auth_middleware));

    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(openapi::router());

    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics: Prometheus scrape endpoint.
///
/// Ledger gauges are refreshed from the store on each scrape.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    match state.ledger.quests(None).await {
        Ok(quests) => {
            let mut by_status: HashMap<QuestStatus, usize> = HashMap::new();
            for q in &quests {
                *by_status.entry(q.status).or_default() += 1;
            }
            metrics.quests_total().reset();
            for (status, count) in &by_status {
                metrics
                    .quests_total()
                    .with_label_values(&[status.as_str()])
                    .set(*count as f64);
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to refresh quest gauges"),
    }

    match state.ledger.leaderboard().await {
        Ok(parties) => metrics.parties_total().set(parties.len() as f64),
        Err(e) => tracing::warn!(error = %e, "failed to refresh party gauge"),
    }

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: 200 "ready" once the ledger store answers.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Err(e) = state.ledger.store().ping().await {
        tracing::warn!("Ledger store health check failed: {e}");
        return (StatusCode::SERVICE_UNAVAILABLE, "ledger store unreachable").into_response();
    }
    (StatusCode::OK, "ready").into_response()
}
