//! Bearer-token auth for the three credential roles (spec §4.5).
//!
//! Submit, runner, and admin are independent shared secrets compared as
//! plain strings — there's no user database, so there's nothing to decode
//! or look up beyond the header itself. The admin credential additionally
//! accepts the runner credential as a convenience for fleet tooling that
//! already carries a runner token.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use super::AppState;

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({"error": "unauthorized"})),
    )
        .into_response()
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Extractor for submit-role endpoints (`/api/jobs/*`).
pub struct RequireSubmit;

impl FromRequestParts<Arc<AppState>> for RequireSubmit {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if token == state.config.submit_token => Ok(RequireSubmit),
            _ => Err(unauthorized()),
        }
    }
}

/// Extractor for runner endpoints that don't yet have a runner id
/// (register, available). Only checks the bearer token.
pub struct RequireRunnerToken;

impl FromRequestParts<Arc<AppState>> for RequireRunnerToken {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if token == state.config.runner_token => Ok(RequireRunnerToken),
            _ => Err(unauthorized()),
        }
    }
}

/// Extractor for per-job runner endpoints: checks the bearer token and
/// pulls the caller's declared identity out of `X-Runner-ID`.
pub struct RequireRunnerIdentity {
    pub runner_id: String,
}

impl FromRequestParts<Arc<AppState>> for RequireRunnerIdentity {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if token == state.config.runner_token => {}
            _ => return Err(unauthorized()),
        }
        let runner_id = parts
            .headers
            .get("X-Runner-ID")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .ok_or_else(unauthorized)?
            .to_string();
        Ok(RequireRunnerIdentity { runner_id })
    }
}

/// Extractor for admin endpoints. Accepts the admin token or the runner
/// token (spec §4.5).
pub struct RequireAdmin;

impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            Some(token) if token == state.config.admin_token || token == state.config.runner_token => Ok(RequireAdmin),
            _ => Err(unauthorized()),
        }
    }
}
