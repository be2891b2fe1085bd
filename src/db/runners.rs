//! Runner registration and liveness tracking.
//!
//! Runners register once to obtain an id, then touch their `last_seen` on
//! every poll. Activeness is derived on read (`now - last_seen < 5 min`,
//! spec §3 invariant 5) rather than stored, and `last_seen` is never swept —
//! a runner that stops polling simply stops showing up as active; its past
//! jobs are untouched.

use anyhow::Result;
use serde_json::Value;

use super::{Database, RunnerRow};

impl Database {
    /// Upsert a runner registration by id: creates the row on first
    /// registration, replaces name/capabilities and refreshes `last_seen`
    /// on re-registration.
    pub async fn register_runner(&self, id: &str, name: &str, capabilities: &Value, now: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO runners (id, name, capabilities, registered_at, last_seen)
             VALUES ($1, $2, $3, $4, $4)
             ON CONFLICT (id) DO UPDATE SET
               name = EXCLUDED.name, capabilities = EXCLUDED.capabilities, last_seen = EXCLUDED.last_seen",
        )
        .bind(id)
        .bind(name)
        .bind(capabilities)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Refresh `last_seen` for an existing runner. Returns `false` if the
    /// runner id is unknown.
    pub async fn touch_runner(&self, id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE runners SET last_seen = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn get_runner(&self, id: &str) -> Result<Option<RunnerRow>> {
        let row = sqlx::query_as::<_, RunnerRow>(
            "SELECT id, name, capabilities, registered_at, last_seen FROM runners WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// All registered runners, ordered by id. Activeness is a pure function
    /// of `last_seen` computed by the caller (see `is_active`), never stored.
    pub async fn list_runners(&self) -> Result<Vec<RunnerRow>> {
        let rows = sqlx::query_as::<_, RunnerRow>(
            "SELECT id, name, capabilities, registered_at, last_seen FROM runners ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

/// `true` iff the runner was seen within the activeness window (5 minutes,
/// spec §3 invariant 5).
pub fn is_active(runner: &RunnerRow, now: i64, active_window_secs: i64) -> bool {
    now - runner.last_seen < active_window_secs * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(last_seen: i64) -> RunnerRow {
        RunnerRow {
            id: "r1".into(),
            name: "worker".into(),
            capabilities: serde_json::json!([]),
            registered_at: 0,
            last_seen,
        }
    }

    #[test]
    fn active_within_window() {
        assert!(is_active(&runner(1_000), 1_000 + 60_000, 300));
    }

    #[test]
    fn inactive_past_window() {
        assert!(!is_active(&runner(0), 301_000, 300));
    }
}
