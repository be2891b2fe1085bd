//! # API — Axum HTTP Server
//!
//! Wires the job-coordinator routes together: authenticated, rate-limited
//! dispatch over the Store, plus a background sweeper that fails jobs whose
//! heartbeat has gone stale (spec §4.5, §4.7).

mod middleware_auth;
mod routes_admin;
mod routes_health;
mod routes_jobs;
mod routes_runners;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::ConnectInfo;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::Router;
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::db::JobRow;
use crate::{config::Config, db, metrics, rate_limit};

pub struct AppState {
    pub db: db::Database,
    pub config: Config,
    pub http_client: reqwest::Client,
    pub rate_limiter: rate_limit::RoleLimiters,
    pub prom_metrics: metrics::Metrics,
}

impl AppState {
    pub fn new(db: db::Database, config: Config) -> Arc<Self> {
        let rate_limiter = rate_limit::RoleLimiters::new(&config.rate_limits);
        Arc::new(AppState {
            db,
            config,
            http_client: reqwest::Client::new(),
            rate_limiter,
            prom_metrics: metrics::Metrics::new(),
        })
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub(crate) fn job_to_json(row: &JobRow) -> Value {
    serde_json::to_value(row).expect("JobRow always serializes")
}

/// The rate limiter's per-client key. `ConnectInfo` is only populated when
/// serving via `into_make_service_with_connect_info` (as `run()` does below);
/// tests that drive the router directly with `oneshot` never populate it, so
/// this falls back to a fixed key rather than requiring the extension.
pub(crate) fn client_ip(connect_info: Option<ConnectInfo<SocketAddr>>) -> String {
    match connect_info {
        Some(ConnectInfo(addr)) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(routes_health::handler_index))
        .route("/health", get(routes_health::handler_index))
        .route("/healthz", get(routes_health::handler_healthz))
        .route("/readyz", get(routes_health::handler_readyz))
        .route("/metrics", get(routes_health::handler_metrics))
        .route("/api/jobs/check", post(routes_jobs::handler_check))
        .route("/api/jobs/submit", post(routes_jobs::handler_submit))
        .route("/api/jobs/{id}", get(routes_jobs::handler_get_job))
        .route("/api/runner/register", post(routes_runners::handler_register))
        .route("/api/runner/verify", get(routes_runners::handler_verify))
        .route("/api/runner/jobs/available", get(routes_runners::handler_available)) // ?types=a,b&limit=
        .route("/api/runner/jobs/{id}/claim", post(routes_runners::handler_claim))
        .route("/api/runner/jobs/{id}/heartbeat", post(routes_runners::handler_heartbeat))
        .route("/api/runner/jobs/{id}/complete", post(routes_runners::handler_complete))
        .route("/api/runner/jobs/{id}/error", post(routes_runners::handler_error))
        .route("/api/admin/stats", get(routes_admin::handler_stats))
        .route("/api/admin/jobs", get(routes_admin::handler_list_jobs))
        .route(
            "/api/admin/jobs/{id}",
            get(routes_admin::handler_job_detail).delete(routes_admin::handler_delete_job),
        )
        .route("/api/admin/jobs/batch-delete", post(routes_admin::handler_batch_delete_jobs))
        .route("/api/admin/runners", get(routes_admin::handler_list_runners))
        .route("/api/admin/runners/{id}", get(routes_admin::handler_runner_detail))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(30)))
        .with_state(state)
}

/// Run the stale-heartbeat sweeper once, updating metrics gauges from the
/// resulting counts.
async fn sweep_once(state: &Arc<AppState>) {
    let now = now_millis();
    match state.db.sweep_stale(state.config.limits.stale_heartbeat_secs, now).await {
        Ok(count) if count > 0 => {
            state.prom_metrics.sweeper_timeouts.inc_by(count);
            tracing::info!(count, "stale sweeper failed jobs for missed heartbeats");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "stale sweeper failed"),
    }

    if let Ok(stats) = state.db.stats_by_status().await {
        let pending = stats.iter().find(|s| s.status == "pending").map(|s| s.count).unwrap_or(0);
        let claimed = stats.iter().find(|s| s.status == "claimed").map(|s| s.count).unwrap_or(0);
        let in_progress = stats.iter().find(|s| s.status == "in_progress").map(|s| s.count).unwrap_or(0);
        state.prom_metrics.jobs_pending.set(pending);
        state.prom_metrics.jobs_in_progress.set(claimed + in_progress);
    }
    if let Ok(runners) = state.db.list_runners().await {
        let active_window = state.config.limits.runner_active_secs;
        let active = runners.iter().filter(|r| db::runners::is_active(r, now, active_window)).count() as i64;
        state.prom_metrics.runners_active.set(active);
    }
}

pub async fn run(config: Config, migrations_dir: &std::path::Path) -> Result<()> {
    let database = db::Database::connect(&config.database_url).await?;
    database.run_migrations(migrations_dir).await?;

    let port = config.port;
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
    let state = AppState::new(database, config);

    // Run once at startup so a long-dead coordinator doesn't leave stale
    // claims sitting unswept until the first interval tick (spec §4.7a).
    sweep_once(&state).await;

    let sweeper_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_once(&sweeper_state).await;
        }
    });

    let app = build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "jobforge coordinator listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("jobforge coordinator shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
            _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        tracing::info!("received SIGINT, shutting down");
    }
}
