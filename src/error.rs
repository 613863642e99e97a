// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Errors raised by the attempt player and its collaborators.
///
/// Network-originated failures always arrive here as values; nothing in the
/// player panics on a bad upstream response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    /// The quiz (or a prior result) could not be fetched. Blocking.
    #[error("quiz unavailable: {0}")]
    FetchFailure(String),

    /// No attempt id could be obtained from the backend. Blocking.
    #[error("could not start attempt: {0}")]
    AttemptStartFailure(String),

    /// An answer upsert failed. Non-fatal, surfaced as a dismissible warning.
    #[error("answer for question {question_id} was not saved: {reason}")]
    AnswerSyncFailure { question_id: i64, reason: String },

    #[error("attempt {attempt_id} was already submitted")]
    AlreadySubmitted { attempt_id: i64 },

    /// Transient submission failure; submit may be invoked again.
    #[error("submission failed, please retry: {0}")]
    SubmissionNetwork(String),

    /// Divergent persisted deadlines for the same quiz. The stored one wins.
    #[error("deadline conflict for quiz {quiz_id}: stored {stored}, computed {computed}")]
    TimerConflict {
        quiz_id: i64,
        stored: i64,
        computed: i64,
    },

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),

    #[error("{action} is not allowed while {phase}")]
    InvalidTransition { action: &'static str, phase: String },

    #[error("question {0} does not belong to this quiz")]
    UnknownQuestion(i64),

    #[error("there is no question at position {0}")]
    NoSuchQuestion(usize),

    #[error("attempt {0} is submitted and can no longer change")]
    AttemptFrozen(i64),

    #[error("deadline storage failed: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for PlayerError {
    fn from(err: sqlx::Error) -> Self {
        PlayerError::Storage(err.to_string())
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., action not allowed in the current phase)
    Conflict(String),

    // 502 Bad Gateway (quiz API unreachable or failing)
    Upstream(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<PlayerError> for AppError {
    fn from(err: PlayerError) -> Self {
        let msg = err.to_string();
        match err {
            PlayerError::FetchFailure(_)
            | PlayerError::AttemptStartFailure(_)
            | PlayerError::SubmissionNetwork(_) => AppError::Upstream(msg),
            PlayerError::AnswerSyncFailure { .. } => AppError::Upstream(msg),
            PlayerError::InvalidAnswer(_)
            | PlayerError::UnknownQuestion(_)
            | PlayerError::NoSuchQuestion(_) => AppError::BadRequest(msg),
            PlayerError::AlreadySubmitted { .. }
            | PlayerError::InvalidTransition { .. }
            | PlayerError::AttemptFrozen(_)
            | PlayerError::TimerConflict { .. } => AppError::Conflict(msg),
            PlayerError::Storage(_) => AppError::InternalServerError(msg),
        }
    }
}

/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
