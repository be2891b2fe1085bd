//! # Main — CLI Entry Point
//!
//! A single `serve` subcommand that loads configuration from flags/env (via
//! `clap` + `dotenvy`, mirroring the teacher binary's `Cli` pattern), runs the
//! schema migrations, and starts the Axum HTTP server with the background
//! stale-heartbeat sweeper (spec §4.7, §10.2).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use jobforge::config::{Cli, Config};

fn init_logging() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt().json().with_target(false).init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from(cli);
    let migrations_dir = PathBuf::from("migrations");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(jobforge::api::run(config, &migrations_dir))
}
