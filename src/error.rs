//! HTTP error envelope and database-error sanitization.
//!
//! DESIGN
//! ======
//! Services return their own `thiserror` enums. Each implements [`ErrorCode`]
//! so routes can turn any of them into an [`ApiError`] with `?`. Database
//! failures never leak their raw text: the Postgres SQLSTATE is mapped to a
//! friendly message and the original error is logged instead.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

const GENERIC_MESSAGE: &str = "An error occurred. Please try again or contact support if the problem persists.";

/// Known SQLSTATE / `PostgREST` codes and the text shown to users.
const DB_ERROR_MESSAGES: &[(&str, &str)] = &[
    ("23505", "This record already exists. Please use a different value."),
    ("23503", "Referenced record not found. Please check your selection."),
    ("23514", "Invalid data provided. Please check your input."),
    ("23502", "Required field is missing. Please fill in all required fields."),
    ("42501", "Access denied. You do not have permission to perform this action."),
    ("PGRST301", "Access denied. Authentication required."),
    ("08000", "Database connection error. Please try again."),
    ("53300", "Database is temporarily unavailable. Please try again later."),
];

/// Substring heuristics applied when the code is unknown.
const DB_MESSAGE_HINTS: &[(&str, &str)] = &[
    ("row-level security", "Access denied. You do not have permission to access this data."),
    ("unique constraint", "This record already exists. Please use a different value."),
    ("foreign key", "Invalid reference. Please check your selection."),
    ("not found", "The requested resource was not found."),
    ("duplicate", "This record already exists."),
    ("invalid", "Invalid data provided. Please check your input."),
];

/// Stable machine-readable code plus HTTP status for a domain error.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn status(&self) -> StatusCode;

    /// Underlying database error, if this is one. Sanitized before display.
    fn db_error(&self) -> Option<&sqlx::Error> {
        None
    }
}

/// Map a database error code and message to a user-safe message.
#[must_use]
pub fn friendly_message(code: Option<&str>, message: &str) -> &'static str {
    if let Some(code) = code
        && let Some((_, text)) = DB_ERROR_MESSAGES.iter().find(|(known, _)| *known == code)
    {
        return text;
    }

    let lowered = message.to_ascii_lowercase();
    DB_MESSAGE_HINTS
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map_or(GENERIC_MESSAGE, |(_, text)| text)
}

/// HTTP status for a database error code.
#[must_use]
pub fn db_status(code: Option<&str>) -> StatusCode {
    match code {
        Some("23505") => StatusCode::CONFLICT,
        Some("23503" | "23514" | "23502") => StatusCode::UNPROCESSABLE_ENTITY,
        Some("42501" | "PGRST301") => StatusCode::FORBIDDEN,
        Some("08000" | "53300") => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Error body returned by every API route.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "E_UNAUTHORIZED", "Authentication required.")
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "E_FORBIDDEN", "Access denied. Administrator rights required.")
    }

    /// Sanitize a database error. The raw error is logged, not returned.
    #[must_use]
    pub fn from_db(err: &sqlx::Error) -> Self {
        let (code, message) = match err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned());
                let text = friendly_message(code.as_deref(), db.message());
                (code, text)
            }
            sqlx::Error::RowNotFound => (None, friendly_message(None, "not found")),
            other => (None, friendly_message(None, &other.to_string())),
        };
        let status = match err {
            sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => db_status(code.as_deref()),
        };
        tracing::error!(error = %err, sqlstate = code.as_deref().unwrap_or("-"), "database error");
        Self::new(status, "E_DATABASE", message)
    }
}

impl<E: ErrorCode> From<E> for ApiError {
    fn from(err: E) -> Self {
        if let Some(db) = err.db_error() {
            return Self::from_db(db);
        }
        Self::new(err.status(), err.error_code(), err.to_string())
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_db(&err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
