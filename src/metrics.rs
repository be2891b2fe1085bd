//! # Prometheus Metrics — Exposition for Container Orchestration
//!
//! Exposes jobforge operational metrics in the Prometheus text exposition
//! format for scraping by Prometheus, Grafana Agent, or any
//! OpenMetrics-compatible collector.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `jobforge_jobs_created_total` | Counter | `job_type` | Total jobs created |
//! | `jobforge_jobs_completed_total` | Counter | `job_type` | Total jobs completed |
//! | `jobforge_jobs_failed_total` | Counter | `job_type` | Total jobs failed (explicit or sweeper) |
//! | `jobforge_claim_conflicts_total` | Counter | — | Claims that lost the race |
//! | `jobforge_sweeper_timeouts_total` | Counter | — | Jobs failed by the stale sweeper |
//! | `jobforge_jobs_pending` | Gauge | — | Jobs currently pending |
//! | `jobforge_jobs_in_progress` | Gauge | — | Jobs currently claimed or in_progress |
//! | `jobforge_runners_active` | Gauge | — | Runners seen within the activeness window |
//!
//! ## Integration
//!
//! The pending/in_progress/active gauges are refreshed from the sweeper's
//! background loop each cadence tick; the counters are updated inline by
//! the route handlers as events happen. The `/metrics` endpoint renders the
//! current registry state on each scrape.
//!
//! ## References
//!
//! - [OpenMetrics specification](https://openmetrics.io/)
//! - [Prometheus exposition format](https://prometheus.io/docs/instrumenting/exposition_formats/)

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;

/// Label set for per-job-type counters.
#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct JobTypeLabel {
    pub job_type: String,
}

/// Thread-safe metrics registry for the jobforge coordinator.
///
/// All fields use atomic types and are safe to update from any thread or
/// async task. `Family` creates per-label-set metric instances on first use.
pub struct Metrics {
    pub registry: Registry,
    pub jobs_created: Family<JobTypeLabel, Counter>,
    pub jobs_completed: Family<JobTypeLabel, Counter>,
    pub jobs_failed: Family<JobTypeLabel, Counter>,
    pub claim_conflicts: Counter,
    pub sweeper_timeouts: Counter,
    pub jobs_pending: Gauge,
    pub jobs_in_progress: Gauge,
    pub runners_active: Gauge,
}

impl Metrics {
    /// Create a new metrics registry with all jobforge metrics registered.
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let jobs_created = Family::<JobTypeLabel, Counter>::default();
        registry.register("jobforge_jobs_created", "Total jobs created by job_type", jobs_created.clone());

        let jobs_completed = Family::<JobTypeLabel, Counter>::default();
        registry.register(
            "jobforge_jobs_completed",
            "Total jobs completed by job_type",
            jobs_completed.clone(),
        );

        let jobs_failed = Family::<JobTypeLabel, Counter>::default();
        registry.register("jobforge_jobs_failed", "Total jobs failed by job_type", jobs_failed.clone());

        let claim_conflicts = Counter::default();
        registry.register("jobforge_claim_conflicts", "Claims that lost the race", claim_conflicts.clone());

        let sweeper_timeouts = Counter::default();
        registry.register(
            "jobforge_sweeper_timeouts",
            "Jobs failed by the stale heartbeat sweeper",
            sweeper_timeouts.clone(),
        );

        let jobs_pending = Gauge::default();
        registry.register("jobforge_jobs_pending", "Jobs currently pending", jobs_pending.clone());

        let jobs_in_progress = Gauge::default();
        registry.register(
            "jobforge_jobs_in_progress",
            "Jobs currently claimed or in_progress",
            jobs_in_progress.clone(),
        );

        let runners_active = Gauge::default();
        registry.register(
            "jobforge_runners_active",
            "Runners seen within the activeness window",
            runners_active.clone(),
        );

        Self {
            registry,
            jobs_created,
            jobs_completed,
            jobs_failed,
            claim_conflicts,
            sweeper_timeouts,
            jobs_pending,
            jobs_in_progress,
            runners_active,
        }
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        encode(&mut buf, &self.registry).expect("encoding metrics should not fail");
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_encode_returns_valid_text() {
        let m = Metrics::new();
        m.jobs_pending.set(5);
        m.claim_conflicts.inc();
        m.jobs_created
            .get_or_create(&JobTypeLabel { job_type: "render".to_string() })
            .inc();

        let output = m.encode();
        assert!(output.contains("jobforge_jobs_pending"));
        assert!(output.contains("jobforge_claim_conflicts"));
        assert!(output.contains("jobforge_jobs_created"));
        assert!(output.contains("render"));
    }

    #[test]
    fn metrics_default_values_are_zero() {
        let m = Metrics::new();
        let output = m.encode();
        assert!(output.contains("jobforge_jobs_pending"));
        assert!(output.contains("jobforge_runners_active"));
    }

    #[test]
    fn metrics_per_job_type_counters_independent() {
        let m = Metrics::new();
        m.jobs_created.get_or_create(&JobTypeLabel { job_type: "render".to_string() }).inc_by(3);
        m.jobs_created.get_or_create(&JobTypeLabel { job_type: "transcode".to_string() }).inc_by(7);

        let output = m.encode();
        assert!(output.contains("render"));
        assert!(output.contains("transcode"));
    }
}
