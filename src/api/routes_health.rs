//! # Health & Observability Endpoints
//!
//! | Endpoint | Purpose |
//! |----------|---------|
//! | `GET /` / `GET /health` | Liveness: `{status:"ok", service:"..."}` |
//! | `GET /healthz` | Liveness, bare 200 |
//! | `GET /readyz` | Readiness — database reachable within 2s |
//! | `GET /metrics` | Prometheus scraping endpoint |

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

use super::AppState;

pub async fn handler_index() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "jobforge" }))
}

/// Liveness probe: bare 200 if the process is serving HTTP at all.
pub async fn handler_healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe: 200 iff the database responds to `SELECT 1` within 2s.
pub async fn handler_readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = std::time::Duration::from_secs(2);
    match tokio::time::timeout(timeout, state.db.health_check()).await {
        Ok(Ok(())) => (StatusCode::OK, "ok"),
        Ok(Err(_)) => (StatusCode::SERVICE_UNAVAILABLE, "database unreachable"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "database timeout"),
    }
}

/// Prometheus metrics endpoint: renders the registry in text exposition format.
pub async fn handler_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state.prom_metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        body,
    )
}
