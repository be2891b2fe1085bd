//! Job persistence and the claim/heartbeat/complete/fail/sweep state machine.
//!
//! Every transition below is one conditional `UPDATE ... WHERE`; the caller
//! learns whether it "won" by checking `rows_affected() == 1`. No operation
//! here spans more than one statement, so read-committed isolation is
//! sufficient — there's nothing for a transaction to protect.

use std::collections::HashSet;

use anyhow::Result;
use serde_json::Value;

use super::{Database, JobRow, StatusCount};

const JOB_COLUMNS: &str = "id, job_hash, job_type, input_params, status, created_at, updated_at, \
     claimed_by, claimed_at, progress_current, progress_total, console_output, output_data, \
     error_message, last_heartbeat";

impl Database {
    /// Insert a new pending job. On a `job_hash` collision the insert is a
    /// no-op and the existing row's id is returned instead — this is what
    /// makes two concurrent submits of the same hash resolve to exactly one
    /// created row (spec §4.4).
    ///
    /// Returns `(id, created)`: `created` is `true` iff this call's row won.
    pub async fn create_job(
        &self,
        id: &str,
        job_hash: &str,
        job_type: &str,
        input_params: &Value,
        now: i64,
    ) -> Result<(String, bool)> {
        let result = sqlx::query(
            "INSERT INTO jobs (id, job_hash, job_type, input_params, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, 'pending', $5, $5)
             ON CONFLICT (job_hash) DO NOTHING",
        )
        .bind(id)
        .bind(job_hash)
        .bind(job_type)
        .bind(input_params)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok((id.to_string(), true));
        }

        let existing_id: String = sqlx::query_scalar("SELECT id FROM jobs WHERE job_hash = $1")
            .bind(job_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok((existing_id, false))
    }

    pub async fn get_by_hash(&self, job_hash: &str) -> Result<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE job_hash = $1"
        ))
        .bind(job_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<JobRow>> {
        let row = sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Jobs currently (or ever) claimed by the given runner, most recent first.
    pub async fn list_by_runner(&self, runner_id: &str) -> Result<Vec<JobRow>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE claimed_by = $1 ORDER BY created_at DESC"
        ))
        .bind(runner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Pending jobs matching any of `types`, FIFO by creation time.
    pub async fn list_available(&self, types: &[String], limit: i64) -> Result<Vec<JobRow>> {
        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs
             WHERE status = 'pending' AND job_type = ANY($1)
             ORDER BY created_at ASC
             LIMIT $2"
        ))
        .bind(types)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// All jobs, optionally filtered by status, most recent first.
    pub async fn list_all(&self, status: Option<&str>, limit: i64) -> Result<Vec<JobRow>> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs WHERE status = $1 ORDER BY created_at DESC LIMIT $2"
                ))
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }

    pub async fn stats_by_status(&self) -> Result<Vec<StatusCount>> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// pending -> claimed. Succeeds iff exactly one row changed.
    pub async fn claim(&self, job_id: &str, runner_id: &str, now: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'claimed', claimed_by = $1, claimed_at = $2,
                last_heartbeat = $2, updated_at = $2
             WHERE id = $3 AND status = 'pending'",
        )
        .bind(runner_id)
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// {claimed,in_progress} -> in_progress, advancing progress and console
    /// output. Succeeds only if `runner_id` matches the job's `claimed_by`.
    pub async fn heartbeat(
        &self,
        job_id: &str,
        runner_id: &str,
        progress_current: Option<i64>,
        progress_total: Option<i64>,
        console_output: Option<&str>,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'in_progress',
                progress_current = COALESCE($1, progress_current),
                progress_total = COALESCE($2, progress_total),
                console_output = COALESCE($3, console_output),
                last_heartbeat = $4, updated_at = $4
             WHERE id = $5 AND claimed_by = $6 AND status IN ('claimed', 'in_progress')",
        )
        .bind(progress_current)
        .bind(progress_total)
        .bind(console_output)
        .bind(now)
        .bind(job_id)
        .bind(runner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// {claimed,in_progress} -> completed. Same ownership precondition as heartbeat.
    pub async fn complete(
        &self,
        job_id: &str,
        runner_id: &str,
        output_data: &Value,
        console_output: Option<&str>,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', output_data = $1,
                console_output = COALESCE($2, console_output),
                updated_at = $3
             WHERE id = $4 AND claimed_by = $5 AND status IN ('claimed', 'in_progress')",
        )
        .bind(output_data)
        .bind(console_output)
        .bind(now)
        .bind(job_id)
        .bind(runner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// {claimed,in_progress} -> failed. Same ownership precondition as heartbeat.
    pub async fn fail(
        &self,
        job_id: &str,
        runner_id: &str,
        error_message: &str,
        console_output: Option<&str>,
        now: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed', error_message = $1,
                console_output = COALESCE($2, console_output),
                updated_at = $3
             WHERE id = $4 AND claimed_by = $5 AND status IN ('claimed', 'in_progress')",
        )
        .bind(error_message)
        .bind(console_output)
        .bind(now)
        .bind(job_id)
        .bind(runner_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Bulk-transition any {claimed,in_progress} job whose last heartbeat is
    /// older than `threshold_secs` to failed with the fixed timeout message.
    /// Returns the number of jobs transitioned.
    pub async fn sweep_stale(&self, threshold_secs: i64, now: i64) -> Result<u64> {
        let cutoff = now - threshold_secs * 1000;
        let result = sqlx::query(
            "UPDATE jobs SET status = 'failed',
                error_message = 'Job timed out - no heartbeat received',
                updated_at = $1
             WHERE status IN ('claimed', 'in_progress') AND last_heartbeat < $2",
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Unconditional delete. Returns `true` iff a row existed to delete.
    pub async fn delete_job(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Unconditional bulk delete. Returns per-id success so callers can
    /// report a partial-success summary.
    pub async fn delete_jobs(&self, ids: &[String]) -> Result<Vec<(String, bool)>> {
        let deleted: Vec<String> = sqlx::query_scalar("DELETE FROM jobs WHERE id = ANY($1) RETURNING id")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        let deleted: HashSet<String> = deleted.into_iter().collect();
        Ok(ids.iter().map(|id| (id.clone(), deleted.contains(id))).collect())
    }
}
