// AutoDNS - Command Line
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Command line interface and one-shot commands.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::backend::{CurrentDns, IpFamily, NetworkBackend, ResolvedBackend};
use crate::models::config::clamp_poll_interval;
use crate::models::{ApplyReport, ApplyStatus, Error, InterfaceItem, Result};
use crate::services::{
    ActivityLog, ApplyCoordinator, EngineEvent, EngineOptions, EngineStatus, ProbeReport,
    ProcessWatcher, ProfileCatalog, SwitchEngine,
};
use crate::storage::DataStore;

/// AutoDNS - DNS profile switcher with per-program automatic switching
#[derive(Parser)]
#[command(name = "autodns")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration directory (default: $XDG_CONFIG_HOME/autodns)
    #[arg(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List selectable network interfaces
    Interfaces,

    /// List DNS profiles
    Profiles,

    /// Show program rules in priority order
    Rules,

    /// Apply a profile to the selected interfaces
    Apply {
        /// Profile name (AdGuard, HiNet, Cloudflare, Google, Dhcp)
        profile: String,

        /// Apply even if the profile is already active
        #[arg(long)]
        force: bool,

        /// Only these interfaces (name or id); repeatable
        #[arg(short, long = "interface")]
        interfaces: Vec<String>,
    },

    /// Show resolvers currently in effect
    Show,

    /// Flush the resolver cache
    Flush,

    /// Compare resolver latency across profiles
    Probe,

    /// Show or clear the activity log
    Logs {
        /// Remove all saved entries
        #[arg(long)]
        clear: bool,
    },

    /// Show or change settings
    Config {
        /// Poll interval in seconds (minimum 3)
        #[arg(long)]
        interval: Option<u64>,

        /// Rule file location
        #[arg(long)]
        rules_file: Option<PathBuf>,

        /// Automatic switching on the next `run` (on|off)
        #[arg(long, value_name = "on|off", value_parser = clap::builder::BoolishValueParser::new())]
        auto: Option<bool>,
    },

    /// Run the interactive console with automatic switching
    Run,
}

/// Engine plus the collaborators a front-end needs.
pub struct Session {
    pub store: Arc<DataStore>,
    pub engine: Arc<SwitchEngine>,
    pub events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Session {
    pub fn open(config_dir: Option<PathBuf>) -> Self {
        let store = Arc::new(match config_dir {
            Some(dir) => DataStore::with_config_dir(dir),
            None => DataStore::new(),
        });
        let settings = store.settings();

        let log = Arc::new(ActivityLog::new(settings.max_log_entries));
        let backend: Arc<dyn NetworkBackend> = Arc::new(ResolvedBackend::new());
        info!("Using the {} backend", backend.name());
        let catalog = Arc::new(ProfileCatalog::new(store.rules_file()));

        let manual_profile = settings.last_manual_profile.as_deref().and_then(|name| {
            catalog
                .resolve(name)
                .map_err(|e| warn!("Ignoring saved manual profile: {}", e))
                .ok()
        });

        let coordinator = ApplyCoordinator::new(backend, log.clone())
            .with_flush_after_apply(settings.flush_after_apply);
        let (engine, events) = SwitchEngine::new(
            catalog,
            ProcessWatcher::system(),
            coordinator,
            log,
            Some(store.clone()),
            EngineOptions {
                poll_interval_secs: settings.poll_interval_secs,
                include_advanced_interfaces: settings.include_advanced_interfaces,
                reassert_on_drift: settings.reassert_on_drift,
                manual_profile,
                probe: settings.probe.clone(),
            },
        );

        Self {
            store,
            engine,
            events,
        }
    }

    /// Persist this session's activity log.
    pub fn close(&self) {
        let entries = self.engine.activity_log().entries();
        if let Err(e) = self.store.append_logs(&entries) {
            warn!("Failed to save activity log: {}", e);
        }
    }
}

/// Execute a command.
pub async fn execute(session: Session, command: Commands) -> Result<()> {
    match command {
        Commands::Run => crate::console::run(session).await,
        Commands::Logs { clear } => show_logs(&session, clear),
        Commands::Config {
            interval,
            rules_file,
            auto,
        } => configure(&session, interval, rules_file, auto),
        command => {
            let result = one_shot(&session, command).await;
            session.close();
            result
        }
    }
}

async fn one_shot(session: &Session, command: Commands) -> Result<()> {
    let engine = &session.engine;
    match command {
        Commands::Interfaces => print_interfaces(&engine.rescan_interfaces().await?),
        Commands::Profiles => print_profiles(engine),
        Commands::Rules => print_rules(session),
        Commands::Apply {
            profile,
            force,
            interfaces,
        } => apply(session, &profile, force, &interfaces).await?,
        Commands::Show => {
            engine.rescan_interfaces().await?;
            print_current_dns(&engine.show_current_dns().await?);
        }
        Commands::Flush => {
            let outcome = engine.flush_resolver_cache().await?;
            println!("Resolver cache flushed ({})", outcome.as_str());
        }
        Commands::Probe => print_probe(&engine.probe_latency().await?),
        Commands::Logs { .. } | Commands::Config { .. } | Commands::Run => {}
    }
    Ok(())
}

fn show_logs(session: &Session, clear: bool) -> Result<()> {
    if clear {
        session.store.clear_logs()?;
        println!("Activity log cleared");
    } else {
        for entry in session.store.logs() {
            println!("{}", entry);
        }
    }
    Ok(())
}

async fn apply(session: &Session, profile: &str, force: bool, interfaces: &[String]) -> Result<()> {
    // A running console may own automatic switching.
    if session.store.settings().automation_enabled {
        return Err(Error::AutomationActive);
    }

    let engine = &session.engine;
    engine.rescan_interfaces().await?;
    if !interfaces.is_empty() {
        engine.select_all(false);
        for name in interfaces {
            engine.set_interface_selected(name, true)?;
        }
    }

    match engine.apply_manual(profile, force).await? {
        Some(report) => {
            print_report(&report);
            if report.status == ApplyStatus::Failed {
                return Err(Error::backend("apply", report.message));
            }
        }
        None => println!("{} is already active", profile),
    }
    Ok(())
}

fn configure(
    session: &Session,
    interval: Option<u64>,
    rules_file: Option<PathBuf>,
    auto: Option<bool>,
) -> Result<()> {
    if interval.is_some() || rules_file.is_some() || auto.is_some() {
        session.store.modify_settings(|s| {
            if let Some(secs) = interval {
                s.poll_interval_secs = clamp_poll_interval(secs);
            }
            if let Some(path) = rules_file {
                s.rules_file = Some(path);
            }
            if let Some(enabled) = auto {
                s.automation_enabled = enabled;
            }
        })?;
    }

    let settings = session.store.settings();
    println!("Config directory:   {}", session.store.config_dir().display());
    println!("Rule file:          {}", session.store.rules_file().display());
    println!("Poll interval:      {}s", settings.poll_interval_secs);
    println!("Automatic mode:     {}", on_off(settings.automation_enabled));
    println!(
        "Manual profile:     {}",
        settings.last_manual_profile.as_deref().unwrap_or("(none)")
    );
    println!("Flush after apply:  {}", on_off(settings.flush_after_apply));
    println!("Re-assert on drift: {}", on_off(settings.reassert_on_drift));
    println!(
        "Advanced adapters:  {}",
        on_off(settings.include_advanced_interfaces)
    );
    Ok(())
}

// ============================================================================
// Output helpers shared with the console
// ============================================================================

pub fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}

pub fn print_interfaces(rows: &[(InterfaceItem, bool)]) {
    if rows.is_empty() {
        println!("No operational interfaces found");
        return;
    }
    for (item, selected) in rows {
        println!(
            "  [{}] {:<28} {:<9} {}",
            if *selected { "x" } else { " " },
            item.to_string(),
            item.adapter_type.display_name(),
            item.id
        );
    }
}

pub fn print_profiles(engine: &SwitchEngine) {
    let status = engine.status();
    for profile in engine.profiles() {
        let mut marks = Vec::new();
        if status.connected_profile == Some(*profile) {
            marks.push("active");
        }
        if status.manual_profile == Some(*profile) {
            marks.push("selected");
        }
        let marks = if marks.is_empty() {
            String::new()
        } else {
            format!(" ({})", marks.join(", "))
        };
        match profile.servers() {
            Some(s) => println!(
                "  {:<11} {} {} | {} {}{}",
                profile.name,
                s.ipv4_primary,
                s.ipv4_secondary,
                s.ipv6_primary,
                s.ipv6_secondary,
                marks
            ),
            None => println!("  {:<11} automatic (DHCP){}", profile.name, marks),
        }
    }
}

pub fn print_rules(session: &Session) {
    let rules = session.engine.rules();
    println!(
        "{} rule(s) from {}",
        rules.len(),
        session.store.rules_file().display()
    );
    for (index, rule) in rules.iter().enumerate() {
        println!("  {:>2}. {} -> {}", index + 1, rule.path.display(), rule.profile);
    }
}

pub fn print_report(report: &ApplyReport) {
    println!("{} [{}]", report.message, report.status.as_str());
    for outcome in &report.interfaces {
        let steps: Vec<String> = outcome
            .steps
            .iter()
            .map(|s| format!("{}: {}", s.step.as_str(), s.outcome.as_str()))
            .collect();
        println!(
            "  {:<28} {:<8} {}",
            outcome.interface.to_string(),
            outcome.status().as_str(),
            steps.join(", ")
        );
    }
}

pub fn print_current_dns(results: &[(InterfaceItem, Result<CurrentDns>)]) {
    for (item, result) in results {
        match result {
            Ok(dns) => {
                println!("  {}", item);
                for family in [IpFamily::V4, IpFamily::V6] {
                    println!("    {} {}", family.as_str(), dns.describe(family));
                }
            }
            Err(e) => println!("  {:<28} error: {}", item.to_string(), e),
        }
    }
}

pub fn print_probe(report: &ProbeReport) {
    for domain in &report.domains {
        println!("{}", domain.domain);
        for timing in &domain.timings {
            match timing.average {
                Some(avg) => println!(
                    "  {:<11} {:>6.1} ms",
                    timing.profile,
                    avg.as_secs_f64() * 1000.0
                ),
                None => println!("  {:<11}   timeout", timing.profile),
            }
        }
        if let Some(fastest) = domain.fastest() {
            println!("  fastest: {}", fastest.profile);
        }
    }
}

pub fn print_status(status: &EngineStatus) {
    println!("Phase:          {}", status.phase.as_str());
    println!("Automatic mode: {}", on_off(status.enabled));
    println!("Busy:           {}", if status.busy { "yes" } else { "no" });
    println!(
        "Selected:       {}",
        status.manual_profile.map(|p| p.name).unwrap_or("(none)")
    );
    println!(
        "Connected:      {}",
        status.connected_profile.map(|p| p.name).unwrap_or("(none)")
    );
    if let Some(signature) = &status.last_signature {
        println!("Last applied:   {}", signature);
    }
    println!("Poll interval:  {}s", status.poll_interval.as_secs());
    println!("Program rules:  {}", status.rule_count);
    print_interfaces(&status.interfaces);
}
