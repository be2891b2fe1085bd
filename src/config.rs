//! Runtime configuration, sourced from CLI flags / environment variables.
//!
//! Mirrors the teacher binary's `Cli` struct: every field is also readable
//! from the environment via `#[arg(env = "...")]`, and `.env` is loaded with
//! `dotenvy` before `clap` parses, so a bare `jobforge serve` works from a
//! project-local `.env` file as well as from exported shell variables.

use clap::Parser;

/// Size and timing constants from spec §3/§4, overridable for tests.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_input_params_bytes: usize,
    pub max_output_data_bytes: usize,
    pub max_console_output_bytes: usize,
    pub max_error_message_bytes: usize,
    pub stale_heartbeat_secs: i64,
    pub runner_active_secs: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_input_params_bytes: 100 * 1024,
            max_output_data_bytes: 500 * 1024,
            max_console_output_bytes: 1024 * 1024,
            max_error_message_bytes: 10 * 1024,
            stale_heartbeat_secs: 90,
            runner_active_secs: 5 * 60,
        }
    }
}

/// Per-role, per-window request caps from spec §4.5.
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub submit_per_minute: u32,
    pub status_per_minute: u32,
    pub runner_per_minute: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        RateLimits {
            submit_per_minute: 10,
            status_per_minute: 60,
            runner_per_minute: 120,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "jobforge", about = "Coordinator for a distributed job-computation fleet")]
pub struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Port the HTTP API listens on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Bearer token accepted on submit-role endpoints
    #[arg(long, env = "SUBMIT_TOKEN")]
    pub submit_token: String,

    /// Bearer token accepted on runner-role endpoints
    #[arg(long, env = "RUNNER_TOKEN")]
    pub runner_token: String,

    /// Bearer token accepted on admin-role endpoints (runner token also accepted)
    #[arg(long, env = "ADMIN_TOKEN")]
    pub admin_token: String,

    /// Outbound webhook URL for new-job notifications; unset disables the notifier
    #[arg(long, env = "NOTIFY_RELAY_URL")]
    pub notify_relay_url: Option<String>,

    /// Publish key sent with notifier requests
    #[arg(long, env = "NOTIFY_PUBLISH_KEY")]
    pub notify_publish_key: Option<String>,

    /// Sweeper cadence, in seconds (must be <= stale_heartbeat_secs to meet spec §4.7)
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 30)]
    pub sweep_interval_secs: u64,
}

/// Application-wide configuration assembled from `Cli` plus the defaulted
/// size/rate-limit tables. Kept distinct from `Cli` so tests can construct
/// one directly without going through argument parsing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub submit_token: String,
    pub runner_token: String,
    pub admin_token: String,
    pub notify_relay_url: Option<String>,
    pub notify_publish_key: Option<String>,
    pub sweep_interval_secs: u64,
    pub limits: Limits,
    pub rate_limits: RateLimits,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Config {
            database_url: cli.database_url,
            port: cli.port,
            submit_token: cli.submit_token,
            runner_token: cli.runner_token,
            admin_token: cli.admin_token,
            notify_relay_url: cli.notify_relay_url,
            notify_publish_key: cli.notify_publish_key,
            sweep_interval_secs: cli.sweep_interval_secs,
            limits: Limits::default(),
            rate_limits: RateLimits::default(),
        }
    }
}
