//! # jobforge — Core Library
//!
//! A coordinator for a distributed, on-demand job-computation service.
//! Clients submit opaque `(job_type, input_params)` work; independent worker
//! processes ("runners") poll for and execute it; the coordinator
//! deduplicates submissions by content hash, tracks execution state through
//! an atomic claim/heartbeat/terminal state machine, caches completed results
//! indefinitely, and validates that cached results still point at live
//! external data before handing them back out.
//!
//! ## Module Organization
//!
//! - [`identity`] — canonical hashing for dedup, opaque id generation
//! - [`validator`] — size/shape checks on payloads, cache-freshness probing
//! - [`notifier`] — best-effort outbound "new job" webhook
//! - [`rate_limit`] — per-identity windowed request counters
//! - [`metrics`] — Prometheus exposition for fleet/job gauges
//! - [`config`] — environment-sourced runtime configuration
//! - [`error`] — the `AppError` type and its HTTP mapping
//! - [`db`] — PostgreSQL storage layer (the Store)
//! - [`api`] — Axum HTTP server: routes, auth, rate limiting, the sweeper

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod notifier;
pub mod rate_limit;
pub mod validator;
