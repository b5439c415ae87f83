use std::collections::BTreeMap;
use std::fmt::Display;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Request-scoped failures. Every variant maps to a JSON `{"error": ...}`
/// body; nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// Payload failed field rules. Serialized as a field -> code map.
    #[error("validation failed")]
    Validation(BTreeMap<String, String>),

    /// A status change that the state machine does not permit.
    #[error("Cannot change status from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// An operation required a precondition state that was not met.
    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Store-level constraint violation, surfaced after rollback.
    #[error("Database Error: {0}")]
    Integrity(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, code: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), code.into());
        AppError::Validation(errors)
    }

    pub fn invalid_transition(from: impl Display, to: impl Display) -> Self {
        AppError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        AppError::InvalidState(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn internal<E: Display>(error: E) -> Self {
        AppError::Internal(error.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::InvalidState(_)
            | AppError::BadRequest(_)
            | AppError::Integrity(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> Value {
        match self {
            AppError::Validation(errors) => json!(errors),
            other => json!(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: Value,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(ErrorResponse { error: self.body() });
        (status, body).into_response()
    }
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match value {
            Error::NotFound => AppError::not_found("resource not found"),
            Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation,
                info,
            ) => AppError::Integrity(info.message().to_string()),
            other => AppError::internal(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}
