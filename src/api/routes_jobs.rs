//! Submit-role job API: dedup-on-hash submission, read-only check, and
//! status-by-id (spec §4.4, §6).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::middleware_auth::RequireSubmit;
use super::{client_ip, job_to_json, now_millis, AppState};
use crate::error::{AppError, AppResult};
use crate::metrics::JobTypeLabel;
use crate::{db::JobRow, identity, notifier, validator};

#[derive(Deserialize)]
pub(super) struct SubmitPayload {
    job_type: String,
    input_params: Value,
}

/// Shared tail of the submit/check algorithm once we know a job row exists:
/// probes freshness on a completed cache hit, otherwise returns current
/// live status or the stored failure.
async fn respond_for_existing(state: &Arc<AppState>, row: JobRow, now: i64) -> AppResult<Response> {
    if row.status == "completed" {
        let output = row.output_data.clone().unwrap_or(Value::Null);
        let fresh = validator::is_result_fresh(&state.http_client, &output, now).await;
        if fresh {
            return Ok((StatusCode::OK, Json(job_to_json(&row))).into_response());
        }
        state.db.delete_job(&row.id).await?;
        return Ok((
            StatusCode::OK,
            Json(json!({ "id": row.id, "job_hash": row.job_hash, "status": "expired" })),
        )
            .into_response());
    }
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}

async fn submit_or_check(state: Arc<AppState>, payload: SubmitPayload, create: bool) -> AppResult<Response> {
    validator::validate_job_type(&payload.job_type)?;
    validator::validate_input_params(&payload.input_params, &state.config.limits)?;

    let hash = identity::job_hash(&payload.job_type, &payload.input_params);
    let now = now_millis();

    let existing = state.db.get_by_hash(&hash).await?;
    match existing {
        Some(row) => respond_for_existing(&state, row, now).await,
        None if !create => Ok((StatusCode::OK, Json(json!({ "exists": false }))).into_response()),
        None => {
            let id = identity::new_id();
            let (id, created) = state
                .db
                .create_job(&id, &hash, &payload.job_type, &payload.input_params, now)
                .await?;

            if !created {
                // Lost the race to a concurrent submit; fall into the existing-job path.
                let row = state
                    .db
                    .get_by_id(&id)
                    .await?
                    .ok_or_else(|| AppError::Store(anyhow::anyhow!("job vanished after create race")))?;
                return respond_for_existing(&state, row, now).await;
            }

            state
                .prom_metrics
                .jobs_created
                .get_or_create(&JobTypeLabel { job_type: payload.job_type.clone() })
                .inc();

            let notify_state = state.clone();
            let (job_id, job_hash, job_type) = (id.clone(), hash.clone(), payload.job_type.clone());
            tokio::spawn(async move {
                notifier::notify_new_job(
                    &notify_state.http_client,
                    notify_state.config.notify_relay_url.as_deref(),
                    notify_state.config.notify_publish_key.as_deref(),
                    &job_id,
                    &job_hash,
                    &job_type,
                    now,
                )
                .await;
            });

            let row = state
                .db
                .get_by_id(&id)
                .await?
                .ok_or_else(|| AppError::Store(anyhow::anyhow!("job vanished immediately after create")))?;
            Ok((StatusCode::CREATED, Json(job_to_json(&row))).into_response())
        }
    }
}

pub(super) async fn handler_submit(
    State(state): State<Arc<AppState>>,
    _auth: RequireSubmit,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<SubmitPayload>,
) -> Result<Response, AppError> {
    if let Some(reset_secs) = state.rate_limiter.check_submit(&client_ip(connect_info)) {
        return Err(AppError::RateLimited { reset_secs });
    }
    submit_or_check(state, payload, true).await
}

pub(super) async fn handler_check(
    State(state): State<Arc<AppState>>,
    _auth: RequireSubmit,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<SubmitPayload>,
) -> Result<Response, AppError> {
    if let Some(reset_secs) = state.rate_limiter.check_status(&client_ip(connect_info)) {
        return Err(AppError::RateLimited { reset_secs });
    }
    submit_or_check(state, payload, false).await
}

pub(super) async fn handler_get_job(
    State(state): State<Arc<AppState>>,
    _auth: RequireSubmit,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, AppError> {
    if let Some(reset_secs) = state.rate_limiter.check_status(&client_ip(connect_info)) {
        return Err(AppError::RateLimited { reset_secs });
    }
    let row = state
        .db
        .get_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no job with id {id}")))?;
    Ok((StatusCode::OK, Json(job_to_json(&row))).into_response())
}
