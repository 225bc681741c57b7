//! # Integration Tests for guild-api
//!
//! Drives the full router over the in-memory ledger with heuristic scoring:
//! health checks, authentication, validation, the accept → submit → score
//! flow, conflict codes, metrics and the OpenAPI document.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use guild_api::config::AppConfig;
use guild_api::state::AppState;

fn config(pairs: &[(&str, &str)]) -> AppConfig {
    let pairs: Vec<(String, String)> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(move |var| {
        pairs
            .iter()
            .find(|(k, _)| k == var)
            .map(|(_, v)| v.clone())
    })
    .unwrap()
}

/// Helper: build the test app with auth disabled and heuristic scoring.
fn test_app() -> Router {
    let (state, _worker) = AppState::in_memory(config(&[])).unwrap();
    guild_api::app(state)
}

fn test_app_with_auth(token: &str) -> Router {
    let (state, _worker) = AppState::in_memory(config(&[("GUILD_API_KEY", token)])).unwrap();
    guild_api::app(state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ));
    (status, value)
}

async fn register(app: &Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/v1/parties", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn post_quest(app: &Router, difficulty: &str, max_attempts: u32) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/v1/quests",
        Some(json!({
            "title": "Survey the northern ridge",
            "description": "List every pass and whether it is open",
            "difficulty": difficulty,
            "gold_reward": 120,
            "max_attempts": max_attempts,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn wait_for_attempt(app: &Router, attempt_id: &str, status: &str) -> Value {
    for _ in 0..200 {
        let (_, body) = send(app, "GET", &format!("/v1/attempts/{attempt_id}"), None).await;
        if body["status"] == status {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("attempt {attempt_id} never reached {status}");
}

async fn wait_for_activity(app: &Router, kind: &str) -> Vec<String> {
    for _ in 0..200 {
        let (_, feed) = send(app, "GET", "/v1/activity?limit=10", None).await;
        let kinds: Vec<String> = feed
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["kind"].as_str().unwrap().to_string())
            .collect();
        if kinds.iter().any(|k| k == kind) {
            return kinds;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("activity feed never recorded {kind}");
}

// -- Health Checks ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_check() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health/liveness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_readiness_check() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/health/readiness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ready");
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_api_requires_token_when_configured() {
    let app = test_app_with_auth("guild-secret");
    let (status, body) = send(&app, "GET", "/v1/parties", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/v1/parties")
                .header("authorization", "Bearer guild-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_is_public_when_auth_enabled() {
    let app = test_app_with_auth("guild-secret");
    let (status, _) = send(&app, "GET", "/health/liveness", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
}

// -- Validation ---------------------------------------------------------------

#[tokio::test]
async fn test_blank_party_name_rejected() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/v1/parties", Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_json_rejected() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/v1/parties", Some(json!({ "nom": "x" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_invalid_quests_rejected() {
    let app = test_app();
    for bad in [
        json!({ "title": "t", "description": "d", "difficulty": "Z", "gold_reward": 10 }),
        json!({ "title": "t", "description": "d", "difficulty": "C", "gold_reward": 0 }),
        json!({ "title": "t", "description": "d", "difficulty": "C", "gold_reward": 10, "max_attempts": 101 }),
        json!({ "title": "", "description": "d", "difficulty": "C", "gold_reward": 10 }),
    ] {
        let (status, _) = send(&app, "POST", "/v1/quests", Some(bad)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn test_quest_defaults() {
    let app = test_app();
    let id = post_quest(&app, "A", 3).await;
    let (status, quest) = send(&app, "GET", &format!("/v1/quests/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quest["status"], "open");
    assert_eq!(quest["rp_reward"], 50);
    assert_eq!(quest["category"], "general");
    assert!(quest["winning_attempt_id"].is_null());
}

// -- Quest Flow ---------------------------------------------------------------

#[tokio::test]
async fn test_accept_submit_and_win() {
    let app = test_app();
    let quest_id = post_quest(&app, "C", 1).await;
    let party_id = register(&app, "Wayfinders").await;

    let (status, attempt) = send(
        &app,
        "POST",
        &format!("/v1/quests/{quest_id}/accept"),
        Some(json!({ "party_id": party_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(attempt["status"], "in_progress");
    let attempt_id = attempt["id"].as_str().unwrap().to_string();

    let (_, quest) = send(&app, "GET", &format!("/v1/quests/{quest_id}"), None).await;
    assert_eq!(quest["status"], "in_progress");

    let (status, submitted) = send(
        &app,
        "POST",
        &format!("/v1/quests/{quest_id}/submit"),
        Some(json!({ "party_id": party_id, "result_text": "x".repeat(800), "token_count": 1200 })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(submitted["status"], "submitted");
    assert_eq!(submitted["token_count"], 1200);
    assert!(submitted["time_taken_seconds"].is_u64());

    let won = wait_for_attempt(&app, &attempt_id, "won").await;
    assert_eq!(won["score"], 75);
    assert!(won["feedback"].as_str().unwrap().contains("substantial"));

    let (_, quest) = send(&app, "GET", &format!("/v1/quests/{quest_id}"), None).await;
    assert_eq!(quest["status"], "completed");
    assert_eq!(quest["winning_attempt_id"], attempt_id.as_str());

    let (_, party) = send(&app, "GET", &format!("/v1/parties/{party_id}"), None).await;
    assert_eq!(party["rp"], 10);
    assert_eq!(party["gold_earned"], 50);
    assert_eq!(party["quests_completed"], 1);
    assert_eq!(party["avg_score"], 75);

    let kinds = wait_for_activity(&app, "quest_completed").await;
    assert!(kinds.iter().any(|k| k == "quest_accepted"));
    assert!(kinds.iter().any(|k| k == "quest_submitted"));
    assert!(kinds.iter().any(|k| k == "quest_scored"));
}

#[tokio::test]
async fn test_conflict_codes() {
    let app = test_app();
    let quest_id = post_quest(&app, "B", 1).await;
    let first = register(&app, "First").await;
    let second = register(&app, "Second").await;
    let accept = format!("/v1/quests/{quest_id}/accept");
    let submit = format!("/v1/quests/{quest_id}/submit");

    let (status, body) = send(
        &app,
        "POST",
        &submit,
        Some(json!({ "party_id": first, "result_text": "early" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NO_ACTIVE_ATTEMPT");

    let (status, _) = send(&app, "POST", &accept, Some(json!({ "party_id": first }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "POST", &accept, Some(json!({ "party_id": first }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ALREADY_ATTEMPTED");

    let (status, body) = send(&app, "POST", &accept, Some(json!({ "party_id": second }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "QUEST_FULL");
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let app = test_app();
    let missing = "00000000-0000-0000-0000-000000000000";
    let party_id = register(&app, "Lost").await;

    for uri in [
        format!("/v1/quests/{missing}"),
        format!("/v1/parties/{missing}"),
        format!("/v1/attempts/{missing}"),
    ] {
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/quests/{missing}/accept"),
        Some(json!({ "party_id": party_id })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let quest_id = post_quest(&app, "C", 2).await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/v1/quests/{quest_id}/accept"),
        Some(json!({ "party_id": missing })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rescore_requires_submitted_attempt() {
    let app = test_app();
    let quest_id = post_quest(&app, "C", 2).await;
    let party_id = register(&app, "Patient").await;
    let (_, attempt) = send(
        &app,
        "POST",
        &format!("/v1/quests/{quest_id}/accept"),
        Some(json!({ "party_id": party_id })),
    )
    .await;
    let attempt_id = attempt["id"].as_str().unwrap();

    let (status, body) = send(&app, "POST", &format!("/v1/attempts/{attempt_id}/rescore"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "NOT_SUBMITTED");
}

#[tokio::test]
async fn test_list_quests_by_status() {
    let app = test_app();
    let open = post_quest(&app, "C", 2).await;
    let busy = post_quest(&app, "S", 2).await;
    let party_id = register(&app, "Busy").await;
    send(
        &app,
        "POST",
        &format!("/v1/quests/{busy}/accept"),
        Some(json!({ "party_id": party_id })),
    )
    .await;

    let (status, quests) = send(&app, "GET", "/v1/quests?status=open", None).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = quests
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![open.as_str()]);

    let (_, all) = send(&app, "GET", "/v1/quests", None).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = send(&app, "GET", "/v1/quests?status=sleeping", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_leaderboard_orders_by_rp() {
    let app = test_app();
    let idle = register(&app, "Idle").await;
    let worker = register(&app, "Worker").await;
    let quest_id = post_quest(&app, "S", 1).await;
    send(
        &app,
        "POST",
        &format!("/v1/quests/{quest_id}/accept"),
        Some(json!({ "party_id": worker })),
    )
    .await;
    let (_, attempt) = send(
        &app,
        "POST",
        &format!("/v1/quests/{quest_id}/submit"),
        Some(json!({ "party_id": worker, "result_text": "y".repeat(600) })),
    )
    .await;
    wait_for_attempt(&app, attempt["id"].as_str().unwrap(), "won").await;

    let (_, board) = send(&app, "GET", "/v1/parties", None).await;
    let ids: Vec<&str> = board
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![worker.as_str(), idle.as_str()]);
    assert_eq!(board[0]["rank"], "silver");
}

// -- Metrics & OpenAPI --------------------------------------------------------

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = test_app();
    post_quest(&app, "C", 1).await;
    let (status, body) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("guild_http_requests_total"));
    assert!(text.contains("guild_quests_total{status=\"open\"} 1"));
}

#[tokio::test]
async fn test_metrics_can_be_disabled() {
    let (state, _worker) = AppState::in_memory(config(&[("METRICS_ENABLED", "false")])).unwrap();
    let app = guild_api::app(state);
    let (status, _) = send(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_openapi_lists_routes() {
    let app = test_app();
    let (status, doc) = send(&app, "GET", "/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let paths = doc["paths"].as_object().unwrap();
    for path in [
        "/v1/parties",
        "/v1/parties/{id}",
        "/v1/quests",
        "/v1/quests/{id}/accept",
        "/v1/quests/{id}/submit",
        "/v1/attempts/{id}/rescore",
        "/v1/activity",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
}
