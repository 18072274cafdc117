// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 400 Bad Request (malformed or rejected input)
    Validation(String),

    // 401 Unauthorized
    Unauthenticated(String),

    // 403 Forbidden (logged in, but not the author)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 400 Bad Request (duplicate unique field, e.g. email at registration)
    Conflict(String),

    // 500 Internal Server Error
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Renders the `{status, message}` envelope: "fail" for client errors,
/// "error" for server errors. Internal causes are logged, never exposed.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, status_text, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "fail", msg),
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "fail", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "fail", msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "fail", msg),
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, "fail", msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "error",
                    "Something went wrong!".to_string(),
                )
            }
        };
        let body = Json(json!({
            "status": status_text,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::Internal`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
