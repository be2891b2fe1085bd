//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Once};

use jobforge::api::AppState;
use jobforge::config::{Limits, RateLimits};

/// Returns the test database URL from the `TEST_DATABASE_URL` environment variable.
/// Panics if the variable is not set.
pub fn test_db_url() -> String {
    std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set for integration tests")
}

/// Returns true if the test database URL is configured.
pub fn has_test_db() -> bool {
    std::env::var("TEST_DATABASE_URL").is_ok()
}

/// One-time schema initialization.
static SCHEMA_INIT: Once = Once::new();

/// Ensure the test database schema is set up (runs migrations once per test suite).
pub fn ensure_schema() {
    SCHEMA_INIT.call_once(|| {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = sqlx::PgPool::connect(&test_db_url()).await.unwrap();
            run_migrations(&pool).await;
        });
    });
}

/// Connect to the test database (also ensures schema is set up) and truncate
/// the `jobs`/`runners` tables for isolation.
pub async fn setup_test_db() -> jobforge::db::Database {
    ensure_schema();
    let db = jobforge::db::Database::connect(&test_db_url())
        .await
        .expect("Failed to connect to test database");
    truncate_all_tables(db.pool()).await;
    db
}

/// Default test config: submit/runner/admin tokens fixed to well-known
/// values so tests can authenticate deterministically, no notify relay
/// configured (notifier silently disabled), and a short sweep interval.
pub fn test_config(database_url: &str) -> jobforge::config::Config {
    jobforge::config::Config {
        database_url: database_url.to_string(),
        port: 0,
        submit_token: "test-submit-token".to_string(),
        runner_token: "test-runner-token".to_string(),
        admin_token: "test-admin-token".to_string(),
        notify_relay_url: None,
        notify_publish_key: None,
        sweep_interval_secs: 30,
        limits: Limits::default(),
        rate_limits: RateLimits {
            submit_per_minute: 10,
            status_per_minute: 60,
            runner_per_minute: 120,
        },
    }
}

/// Build an Axum test app router connected to the test database, with
/// generous (effectively unbounded) rate limits so unrelated tests don't
/// trip each other's windows.
pub async fn build_test_app() -> axum::Router {
    let db = setup_test_db().await;
    let mut config = test_config(&test_db_url());
    config.rate_limits = RateLimits {
        submit_per_minute: 1_000_000,
        status_per_minute: 1_000_000,
        runner_per_minute: 1_000_000,
    };
    let state = AppState::new(db, config);
    jobforge::api::build_router(state)
}

/// Build an Axum test app router with a caller-supplied config, for tests
/// that exercise rate limiting or other config-dependent behavior directly.
pub async fn build_test_app_with_config(config: jobforge::config::Config) -> axum::Router {
    let db = setup_test_db().await;
    let state = AppState::new(db, config);
    jobforge::api::build_router(state)
}

pub const SUBMIT_TOKEN: &str = "test-submit-token";
pub const RUNNER_TOKEN: &str = "test-runner-token";
pub const ADMIN_TOKEN: &str = "test-admin-token";

/// Truncate the coordinator's tables to ensure test isolation.
pub async fn truncate_all_tables(pool: &sqlx::PgPool) {
    sqlx::raw_sql("TRUNCATE TABLE jobs, runners CASCADE").execute(pool).await.unwrap();
}

/// Run the repo's migration files against the test database.
async fn run_migrations(pool: &sqlx::PgPool) {
    let mut entries: Vec<PathBuf> = std::fs::read_dir("migrations")
        .expect("migrations directory must exist")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "sql").unwrap_or(false))
        .collect();
    entries.sort();
    for path in entries {
        let sql = std::fs::read_to_string(&path).unwrap();
        sqlx::raw_sql(&sql)
            .execute(pool)
            .await
            .unwrap_or_else(|e| panic!("migration {} failed: {}", path.display(), e));
    }
}
