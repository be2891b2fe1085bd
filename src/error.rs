//! The coordinator's single error type and its HTTP mapping (spec §7).
//!
//! Store and validation code return `anyhow::Result` the way the teacher's
//! `db` module does; handlers convert into `AppError` at the boundary so the
//! `{error, details?}` envelope and status code live in exactly one place
//! instead of being re-typed at every call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("rate limit exceeded, retry after {reset_secs}s")]
    RateLimited { reset_secs: u64 },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", Some(msg.clone())),
            AppError::RateLimited { reset_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                Some(format!("retry after {reset_secs}s")),
            ),
            AppError::Store(e) => {
                tracing::error!(error = %e, "store error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", Some(e.to_string()))
            }
        };
        let mut body = json!({ "error": error });
        if let Some(details) = details {
            body["details"] = json!(details);
        }
        if let AppError::RateLimited { reset_secs } = &self {
            body["reset_secs"] = json!(reset_secs);
        }
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
