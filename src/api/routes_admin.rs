//! Admin-role API: fleet-wide stats, job/runner inspection, and deletion
//! (spec §6). Unbounded rate limit, per §4.5.

use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::middleware_auth::RequireAdmin;
use super::{job_to_json, now_millis, AppState};
use crate::db::runners::is_active;
use crate::error::{AppError, AppResult};

pub(super) async fn handler_stats(State(state): State<Arc<AppState>>, _auth: RequireAdmin) -> AppResult<Response> {
    let by_status = state.db.stats_by_status().await?;
    let runners = state.db.list_runners().await?;
    let now = now_millis();
    let active_window = state.config.limits.runner_active_secs;
    let active_runners = runners.iter().filter(|r| is_active(r, now, active_window)).count();

    Ok((
        StatusCode::OK,
        Json(json!({
            "jobs_by_status": by_status,
            "runner_count": runners.len(),
            "active_runner_count": active_runners,
        })),
    )
        .into_response())
}

#[derive(Deserialize)]
pub(super) struct ListJobsQuery {
    status: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    100
}

pub(super) async fn handler_list_jobs(
    State(state): State<Arc<AppState>>,
    _auth: RequireAdmin,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Response> {
    let jobs = state.db.list_all(query.status.as_deref(), query.limit).await?;
    Ok((StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response())
}

pub(super) async fn handler_job_detail(
    State(state): State<Arc<AppState>>,
    _auth: RequireAdmin,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Response> {
    let row = state
        .db
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no job with id {id}")))?;
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}

pub(super) async fn handler_delete_job(
    State(state): State<Arc<AppState>>,
    _auth: RequireAdmin,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Response> {
    let deleted = state.db.delete_job(&id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("no job with id {id}")));
    }
    Ok((StatusCode::OK, Json(json!({ "deleted": true, "id": id }))).into_response())
}

#[derive(Deserialize)]
pub(super) struct BatchDeletePayload {
    job_ids: Vec<String>,
}

pub(super) async fn handler_batch_delete_jobs(
    State(state): State<Arc<AppState>>,
    _auth: RequireAdmin,
    Json(payload): Json<BatchDeletePayload>,
) -> AppResult<Response> {
    let results = state.db.delete_jobs(&payload.job_ids).await?;
    let deleted: Vec<&String> = results.iter().filter(|(_, ok)| *ok).map(|(id, _)| id).collect();
    let failed: Vec<&String> = results.iter().filter(|(_, ok)| !*ok).map(|(id, _)| id).collect();
    Ok((
        StatusCode::OK,
        Json(json!({ "deleted": deleted, "failed": failed })),
    )
        .into_response())
}

pub(super) async fn handler_list_runners(
    State(state): State<Arc<AppState>>,
    _auth: RequireAdmin,
) -> AppResult<Response> {
    let runners = state.db.list_runners().await?;
    let now = now_millis();
    let active_window = state.config.limits.runner_active_secs;
    let runners: Vec<_> = runners
        .into_iter()
        .map(|r| {
            let active = is_active(&r, now, active_window);
            json!({
                "id": r.id,
                "name": r.name,
                "capabilities": r.capabilities,
                "registered_at": r.registered_at,
                "last_seen": r.last_seen,
                "active": active,
            })
        })
        .collect();
    Ok((StatusCode::OK, Json(json!({ "runners": runners }))).into_response())
}

pub(super) async fn handler_runner_detail(
    State(state): State<Arc<AppState>>,
    _auth: RequireAdmin,
    AxumPath(id): AxumPath<String>,
) -> AppResult<Response> {
    let runner = state
        .db
        .get_runner(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no runner with id {id}")))?;
    let jobs = state.db.list_by_runner(&id).await?;
    let now = now_millis();
    let active_window = state.config.limits.runner_active_secs;
    let active = is_active(&runner, now, active_window);
    Ok((
        StatusCode::OK,
        Json(json!({
            "id": runner.id,
            "name": runner.name,
            "capabilities": runner.capabilities,
            "registered_at": runner.registered_at,
            "last_seen": runner.last_seen,
            "active": active,
            "jobs": jobs,
        })),
    )
        .into_response())
}
