use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::auth::AuthError;

/// PostgreSQL SQLSTATE for a violated CHECK constraint.
const CHECK_VIOLATION: &str = "23514";

/// AppError
///
/// Every failure a route can produce. Handlers return `Result<_, AppError>` and the conversion
/// into `{message, error?}` JSON happens once, here, at the route boundary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed, missing or out-of-constraint input.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// Missing, malformed, expired, revoked or wrong-type token.
    #[error(transparent)]
    Unauthorized(#[from] AuthError),

    /// The token is valid but its role is not allowed on this route.
    #[error("access forbidden: insufficient permissions")]
    Forbidden,

    /// No row matched.
    #[error("{0}")]
    NotFound(String),

    /// Driver-level failure.
    #[error("database error occurred")]
    Database(#[from] sqlx::Error),

    /// Catch-all.
    #[error("{message}")]
    Unexpected { message: String, details: String },
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unexpected(details: impl ToString) -> Self {
        Self::Unexpected {
            message: "an unexpected error occurred".to_string(),
            details: details.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(err) if is_check_violation(err) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Unexpected { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation {
                message,
                details: Some(details),
            } => json!({ "message": message, "error": details }),
            AppError::Unauthorized(err) => json!({ "message": err.to_string(), "error": err.code() }),
            AppError::Database(err) if is_check_violation(err) => {
                let constraint = match err {
                    sqlx::Error::Database(db_err) => db_err.constraint().unwrap_or("unknown"),
                    _ => "unknown",
                };
                json!({ "message": "validation error", "error": format!("constraint {constraint} violated") })
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "Database error");
                json!({ "message": self.to_string(), "error": err.to_string() })
            }
            AppError::Unexpected { message, details } => {
                tracing::error!(error = %details, "Unexpected error");
                json!({ "message": message, "error": details })
            }
            _ => json!({ "message": self.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

fn is_check_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(CHECK_VIOLATION),
        _ => false,
    }
}
