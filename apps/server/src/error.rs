//! Error types for the queue server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ticket not in expected state: {0}")]
    InvalidState(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Lost an optimistic-concurrency race. Retried by the caller where it makes sense.
    #[error("Concurrent modification: {0}")]
    Conflict(String),

    /// Retries exhausted; the client may try again.
    #[error("Temporarily unavailable: {0}")]
    Transient(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Domain(#[from] medqueue_core::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// SQLSTATEs worth another attempt: serialization failure, deadlock,
/// `lock_timeout` and `statement_timeout`.
const RETRYABLE_SQLSTATES: [&str; 4] = ["40001", "40P01", "55P03", "57014"];

impl Error {
    /// Conflicts and contention errors a caller may retry. Once retries run out
    /// these surface as 503.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Conflict(_) => true,
            Error::Database(sqlx::Error::PoolTimedOut) => true,
            Error::Database(sqlx::Error::Database(db)) => db
                .code()
                .is_some_and(|code| RETRYABLE_SQLSTATES.iter().any(|state| code == *state)),
            _ => false,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            Error::AlreadyExists(_) => (StatusCode::CONFLICT, "already_exists"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, "transient"),
            Error::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Error::Database(_) if self.is_retryable() => {
                (StatusCode::SERVICE_UNAVAILABLE, "transient")
            }
            Error::Domain(medqueue_core::Error::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_state")
            }
            Error::Domain(_) => (StatusCode::BAD_REQUEST, "validation"),
            Error::Database(_) | Error::Internal(_) | Error::Other(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        Error::Validation(errors.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Internal error: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
