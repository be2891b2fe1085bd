//! # Database — PostgreSQL Storage Layer
//!
//! Async persistence for the two relations the coordinator owns: `jobs` and
//! `runners` (spec §3). Every multi-field transition is expressed as a
//! single conditional `UPDATE ... WHERE`, so the Store never needs a
//! transaction spanning more than one statement to stay race-safe — the
//! unique index on `job_hash` and the `WHERE` clause on each transition do
//! all of the concurrency work.
//!
//! The Store never parses `input_params` or `output_data`; they are opaque
//! `JSONB` blobs as far as this module is concerned.
//!
//! ## Module Structure
//!
//! - [`jobs`] — job creation, lookup, listing, and the claim/heartbeat/
//!   complete/fail/sweep state machine
//! - [`runners`] — runner registration, heartbeat touch, listing

mod jobs;
pub mod runners;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// A persisted job row, mirroring the `jobs` table exactly.
#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub job_hash: String,
    pub job_type: String,
    pub input_params: Value,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<i64>,
    pub progress_current: Option<i64>,
    pub progress_total: Option<i64>,
    pub console_output: String,
    pub output_data: Option<Value>,
    pub error_message: Option<String>,
    pub last_heartbeat: Option<i64>,
}

/// A persisted runner row, mirroring the `runners` table exactly.
#[derive(Clone, Serialize, sqlx::FromRow)]
pub struct RunnerRow {
    pub id: String,
    pub name: String,
    pub capabilities: Value,
    pub registered_at: i64,
    pub last_seen: i64,
}

/// Job counts grouped by status, for `/api/admin/stats`.
#[derive(Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Database { pool })
    }

    /// Run the repo's `.sql` migration files against the connected database.
    ///
    /// Deliberately not `sqlx::migrate!`: the migrations here are a handful
    /// of idempotent `CREATE TABLE IF NOT EXISTS` statements, applied the
    /// same way the integration test harness bootstraps its own schema.
    pub async fn run_migrations(&self, migrations_dir: &std::path::Path) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(migrations_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "sql").unwrap_or(false))
            .collect();
        entries.sort();
        for path in entries {
            let sql = std::fs::read_to_string(&path)?;
            sqlx::raw_sql(&sql).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    ///
    /// Used by the `/readyz` readiness probe.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
