// AutoDNS - Main Entry Point
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # AutoDNS
//!
//! Per-interface DNS profile switcher for Linux. Applies one of a fixed set
//! of resolver profiles through systemd-resolved and, in automatic mode,
//! switches profile based on which configured programs are running.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod console;
mod models;
mod network_utils;
mod scheduler;
mod services;
mod storage;

use cli::{Cli, Session};
use models::AppConfig;

/// Human-readable application name.
pub const APP_NAME: &str = "AutoDNS";

/// Application version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the log filter. `RUST_LOG` wins, then `--debug`, then the configured level.
fn log_filter(debug: bool, config_dir: &std::path::Path) -> EnvFilter {
    let configured = AppConfig::load_from_file(&config_dir.join("settings.toml"))
        .map(|c| c.log_level)
        .unwrap_or_else(|_| "info".to_string());
    let level = if debug { "debug".to_string() } else { configured };

    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(storage::default_config_dir);

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.debug, &config_dir))
        .with_target(false)
        .init();

    tracing::debug!("Starting {} v{}", APP_NAME, VERSION);

    let session = Session::open(Some(config_dir));
    match cli::execute(session, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
