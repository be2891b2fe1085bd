//! Runner-role API: registration, liveness, polling, and the per-job
//! claim/heartbeat/complete/error transitions (spec §4.4, §6).

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::middleware_auth::{RequireRunnerIdentity, RequireRunnerToken};
use super::{job_to_json, now_millis, AppState};
use crate::db::JobRow;
use crate::error::{AppError, AppResult};
use crate::{identity, validator};

#[derive(Deserialize)]
pub(super) struct RegisterPayload {
    name: String,
    #[serde(default)]
    capabilities: Vec<String>,
}

pub(super) async fn handler_register(
    State(state): State<Arc<AppState>>,
    _auth: RequireRunnerToken,
    Json(payload): Json<RegisterPayload>,
) -> AppResult<Response> {
    let id = identity::new_id();
    let now = now_millis();
    state
        .db
        .register_runner(&id, &payload.name, &json!(payload.capabilities), now)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "runner_id": id }))).into_response())
}

pub(super) async fn handler_verify(
    State(state): State<Arc<AppState>>,
    auth: RequireRunnerIdentity,
) -> AppResult<Response> {
    if let Some(reset_secs) = state.rate_limiter.check_runner(&auth.runner_id) {
        return Err(AppError::RateLimited { reset_secs });
    }
    match state.db.get_runner(&auth.runner_id).await? {
        Some(_) => {
            state.db.touch_runner(&auth.runner_id, now_millis()).await?;
            Ok((StatusCode::OK, Json(json!({ "exists": true, "runner_id": auth.runner_id }))).into_response())
        }
        None => Err(AppError::NotFound(format!("no runner with id {}", auth.runner_id))),
    }
}

#[derive(Deserialize)]
pub(super) struct AvailableQuery {
    #[serde(default)]
    types: String,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    50
}

pub(super) async fn handler_available(
    State(state): State<Arc<AppState>>,
    auth: RequireRunnerIdentity,
    Query(query): Query<AvailableQuery>,
) -> AppResult<Response> {
    if let Some(reset_secs) = state.rate_limiter.check_runner(&auth.runner_id) {
        return Err(AppError::RateLimited { reset_secs });
    }
    let types: Vec<String> = query.types.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
    if types.is_empty() {
        return Ok((StatusCode::OK, Json(json!({ "jobs": Vec::<JobRow>::new() }))).into_response());
    }
    let jobs = state.db.list_available(&types, query.limit).await?;
    Ok((StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response())
}

/// Look up why a caller's heartbeat/complete/error on `job_id` was rejected,
/// so runners get a specific, actionable 400/404 instead of a bare failure.
async fn explain_rejection(state: &Arc<AppState>, job_id: &str, runner_id: &str) -> AppError {
    match state.db.get_by_id(job_id).await {
        Ok(None) => AppError::NotFound(format!("no job with id {job_id}")),
        Ok(Some(row)) if row.claimed_by.as_deref() != Some(runner_id) => {
            AppError::Validation("not claimed by this runner".into())
        }
        Ok(Some(_)) => AppError::Validation("job is not in a live state".into()),
        Err(e) => AppError::Store(e),
    }
}

pub(super) async fn handler_claim(
    State(state): State<Arc<AppState>>,
    auth: RequireRunnerIdentity,
    AxumPath(job_id): AxumPath<String>,
) -> AppResult<Response> {
    if let Some(reset_secs) = state.rate_limiter.check_runner(&auth.runner_id) {
        return Err(AppError::RateLimited { reset_secs });
    }
    let now = now_millis();
    let won = state.db.claim(&job_id, &auth.runner_id, now).await?;
    if !won {
        state.prom_metrics.claim_conflicts.inc();
        return match state.db.get_by_id(&job_id).await? {
            None => Err(AppError::NotFound(format!("no job with id {job_id}"))),
            Some(_) => Err(AppError::Conflict("job already claimed".into())),
        };
    }
    let row = state
        .db
        .get_by_id(&job_id)
        .await?
        .ok_or_else(|| AppError::Store(anyhow::anyhow!("job vanished after claim")))?;
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}

#[derive(Deserialize)]
pub(super) struct HeartbeatPayload {
    progress_current: Option<i64>,
    progress_total: Option<i64>,
    #[serde(default)]
    console_output: Option<String>,
}

pub(super) async fn handler_heartbeat(
    State(state): State<Arc<AppState>>,
    auth: RequireRunnerIdentity,
    AxumPath(job_id): AxumPath<String>,
    Json(payload): Json<HeartbeatPayload>,
) -> AppResult<Response> {
    if let Some(reset_secs) = state.rate_limiter.check_runner(&auth.runner_id) {
        return Err(AppError::RateLimited { reset_secs });
    }
    if let Some(console) = &payload.console_output {
        validator::validate_console_output(console, &state.config.limits)?;
    }
    let now = now_millis();
    let ok = state
        .db
        .heartbeat(
            &job_id,
            &auth.runner_id,
            payload.progress_current,
            payload.progress_total,
            payload.console_output.as_deref(),
            now,
        )
        .await?;
    if !ok {
        return Err(explain_rejection(&state, &job_id, &auth.runner_id).await);
    }
    let row = state
        .db
        .get_by_id(&job_id)
        .await?
        .ok_or_else(|| AppError::Store(anyhow::anyhow!("job vanished after heartbeat")))?;
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}

#[derive(Deserialize)]
pub(super) struct CompletePayload {
    output_data: Value,
    #[serde(default)]
    console_output: Option<String>,
}

pub(super) async fn handler_complete(
    State(state): State<Arc<AppState>>,
    auth: RequireRunnerIdentity,
    AxumPath(job_id): AxumPath<String>,
    Json(payload): Json<CompletePayload>,
) -> AppResult<Response> {
    if let Some(reset_secs) = state.rate_limiter.check_runner(&auth.runner_id) {
        return Err(AppError::RateLimited { reset_secs });
    }
    validator::validate_output_data(&payload.output_data, &state.config.limits)?;
    if let Some(console) = &payload.console_output {
        validator::validate_console_output(console, &state.config.limits)?;
    }
    let now = now_millis();
    let job_type = state.db.get_by_id(&job_id).await?.map(|r| r.job_type);
    let ok = state
        .db
        .complete(&job_id, &auth.runner_id, &payload.output_data, payload.console_output.as_deref(), now)
        .await?;
    if !ok {
        return Err(explain_rejection(&state, &job_id, &auth.runner_id).await);
    }
    if let Some(job_type) = job_type {
        state
            .prom_metrics
            .jobs_completed
            .get_or_create(&crate::metrics::JobTypeLabel { job_type })
            .inc();
    }
    let row = state
        .db
        .get_by_id(&job_id)
        .await?
        .ok_or_else(|| AppError::Store(anyhow::anyhow!("job vanished after complete")))?;
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}

#[derive(Deserialize)]
pub(super) struct FailPayload {
    error_message: String,
    #[serde(default)]
    console_output: Option<String>,
}

pub(super) async fn handler_error(
    State(state): State<Arc<AppState>>,
    auth: RequireRunnerIdentity,
    AxumPath(job_id): AxumPath<String>,
    Json(payload): Json<FailPayload>,
) -> AppResult<Response> {
    if let Some(reset_secs) = state.rate_limiter.check_runner(&auth.runner_id) {
        return Err(AppError::RateLimited { reset_secs });
    }
    validator::validate_error_message(&payload.error_message, &state.config.limits)?;
    if let Some(console) = &payload.console_output {
        validator::validate_console_output(console, &state.config.limits)?;
    }
    let now = now_millis();
    let job_type = state.db.get_by_id(&job_id).await?.map(|r| r.job_type);
    let ok = state
        .db
        .fail(&job_id, &auth.runner_id, &payload.error_message, payload.console_output.as_deref(), now)
        .await?;
    if !ok {
        return Err(explain_rejection(&state, &job_id, &auth.runner_id).await);
    }
    if let Some(job_type) = job_type {
        state
            .prom_metrics
            .jobs_failed
            .get_or_create(&crate::metrics::JobTypeLabel { job_type })
            .inc();
    }
    let row = state
        .db
        .get_by_id(&job_id)
        .await?
        .ok_or_else(|| AppError::Store(anyhow::anyhow!("job vanished after error")))?;
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}
