//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps ledger errors to HTTP status codes and returns JSON bodies with an
//! error code, message, and optional details. Internal error details are
//! logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use guild_settlement::{LedgerError, StoreError};

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "QUEST_FULL").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (422).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict with current resource state (409). The code distinguishes
    /// the ledger rule that was violated.
    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// Dependency unavailable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict { code, .. } => (StatusCode::CONFLICT, code),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }

    fn conflict(code: &'static str, message: impl ToString) -> Self {
        Self::Conflict {
            code,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::QuestNotFound(_)
            | LedgerError::PartyNotFound(_)
            | LedgerError::AttemptNotFound(_) => Self::NotFound(err.to_string()),
            LedgerError::NoActiveAttempt { .. } => Self::conflict("NO_ACTIVE_ATTEMPT", err),
            LedgerError::AlreadyAttempted { .. } => Self::conflict("ALREADY_ATTEMPTED", err),
            LedgerError::QuestFull { .. } => Self::conflict("QUEST_FULL", err),
            LedgerError::QuestNotAcceptingAttempts { .. } => {
                Self::conflict("QUEST_NOT_ACCEPTING_ATTEMPTS", err)
            }
            LedgerError::NotSubmitted { .. } => Self::conflict("NOT_SUBMITTED", err),
            LedgerError::Validation(msg) => Self::Validation(msg),
            LedgerError::QueueUnavailable => Self::ServiceUnavailable(err.to_string()),
            LedgerError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::conflict("CONFLICT", err),
            other => Self::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guild_core::{PartyId, QuestId};
    use guild_settlement::RecordKind;
    use guild_state::QuestStatus;
    use http_body_util::BodyExt;

    #[test]
    fn not_found_status_code() {
        let err: AppError = LedgerError::QuestNotFound(QuestId::new()).into();
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "NOT_FOUND");
    }

    #[test]
    fn ledger_conflicts_keep_their_codes() {
        let cases = [
            (
                LedgerError::QuestFull {
                    quest_id: QuestId::new(),
                    max_attempts: 2,
                },
                "QUEST_FULL",
            ),
            (
                LedgerError::AlreadyAttempted {
                    quest_id: QuestId::new(),
                    party_id: PartyId::new(),
                },
                "ALREADY_ATTEMPTED",
            ),
            (
                LedgerError::QuestNotAcceptingAttempts {
                    quest_id: QuestId::new(),
                    status: QuestStatus::Completed,
                },
                "QUEST_NOT_ACCEPTING_ATTEMPTS",
            ),
            (
                LedgerError::NoActiveAttempt {
                    quest_id: QuestId::new(),
                    party_id: PartyId::new(),
                },
                "NO_ACTIVE_ATTEMPT",
            ),
        ];
        for (err, expected) in cases {
            let (status, code) = AppError::from(err).status_and_code();
            assert_eq!(status, StatusCode::CONFLICT);
            assert_eq!(code, expected);
        }
    }

    #[test]
    fn validation_status_code() {
        let err: AppError = LedgerError::Validation("title must not be empty".into()).into();
        let (status, code) = err.status_and_code();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "VALIDATION_ERROR");
    }

    #[test]
    fn queue_unavailable_is_503() {
        let err: AppError = LedgerError::QueueUnavailable.into();
        assert_eq!(err.status_and_code().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn backend_failures_are_internal() {
        let err: AppError = LedgerError::Store(StoreError::Backend("pool timed out".into())).into();
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn exhausted_store_conflict_is_409() {
        let err: AppError = StoreError::conflict(RecordKind::Quest, QuestId::new(), 3).into();
        assert_eq!(err.status_and_code(), (StatusCode::CONFLICT, "CONFLICT"));
    }

    #[tokio::test]
    async fn internal_message_is_hidden() {
        let response = AppError::Internal("password=hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(!body.error.message.contains("hunter2"));
    }
}
