// AutoDNS - Interactive Console
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Line-oriented console for `autodns run`.
//!
//! Engine events are printed as they arrive. Commands that talk to the
//! backend run on their own task so the prompt stays responsive.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::cli::{
    on_off, print_current_dns, print_interfaces, print_probe, print_profiles, print_report,
    print_rules, print_status, Session,
};
use crate::models::{ApplyOrigin, Result};
use crate::services::{EngineEvent, SwitchEngine};

const HELP: &str = "\
Commands:
  status                     engine state and interfaces
  interfaces                 rescan adapters
  select <id|name|all> on|off
  profiles                   list profiles
  profile <name>             set the fallback profile without applying
  apply <name> [--force]     apply now (automatic mode must be off)
  auto on|off                automatic switching
  interval <secs>            poll interval (minimum 3)
  rules                      show program rules
  reload                     reload program rules
  show                       resolvers currently in effect
  flush                      flush the resolver cache
  probe                      compare resolver latency
  log                        this session's activity
  quit";

/// What the loop should do after a command.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Parsed console command.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Status,
    Interfaces,
    Select { target: String, on: bool },
    Profiles,
    Profile(String),
    Apply { profile: String, force: bool },
    Auto(bool),
    Interval(u64),
    Rules,
    Reload,
    Show,
    Flush,
    Probe,
    Log,
    Quit,
}

fn parse_switch(word: Option<&str>) -> std::result::Result<bool, String> {
    match word {
        Some("on") | Some("true") | Some("1") => Ok(true),
        Some("off") | Some("false") | Some("0") => Ok(false),
        _ => Err("expected on or off".to_string()),
    }
}

fn parse_command(line: &str) -> std::result::Result<Option<Command>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();

    let command = match head.to_ascii_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "status" => Command::Status,
        "interfaces" | "scan" => Command::Interfaces,
        "select" => {
            let target = rest.first().ok_or("usage: select <id|name|all> on|off")?;
            Command::Select {
                target: target.to_string(),
                on: parse_switch(rest.get(1).copied())?,
            }
        }
        "profiles" => Command::Profiles,
        "profile" => Command::Profile(rest.first().ok_or("usage: profile <name>")?.to_string()),
        "apply" => {
            let force = rest.contains(&"--force");
            let profile = rest
                .iter()
                .find(|w| !w.starts_with("--"))
                .ok_or("usage: apply <name> [--force]")?;
            Command::Apply {
                profile: profile.to_string(),
                force,
            }
        }
        "auto" => Command::Auto(parse_switch(rest.first().copied())?),
        "interval" => {
            let secs = rest
                .first()
                .and_then(|s| s.parse::<u64>().ok())
                .ok_or("usage: interval <secs>")?;
            Command::Interval(secs)
        }
        "rules" => Command::Rules,
        "reload" => Command::Reload,
        "show" => Command::Show,
        "flush" => Command::Flush,
        "probe" => Command::Probe,
        "log" | "logs" => Command::Log,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

/// Run the console until `quit`, end of input or Ctrl-C.
pub async fn run(mut session: Session) -> Result<()> {
    let engine = session.engine.clone();

    if let Err(e) = engine.rescan_interfaces().await {
        warn!("Interface scan failed: {}", e);
    }
    print_interfaces(&engine.interfaces());

    if session.store.settings().automation_enabled {
        info!("Restoring automatic switching");
        engine.enable();
    }
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            Some(event) = session.events.recv() => print_event(event),
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if handle(&session, command).await == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read input: {}", e);
                    break;
                }
            },
            _ = &mut ctrl_c => {
                println!();
                break;
            }
        }
    }

    println!("Shutting down...");
    engine.shutdown();
    engine.wait_idle().await;
    session.close();
    Ok(())
}

fn print_event(event: EngineEvent) {
    match event {
        EngineEvent::Phase(phase) => tracing::debug!("Engine phase: {}", phase.as_str()),
        EngineEvent::Applied(report) => {
            // User-triggered applies are printed by their command.
            if report.origin == ApplyOrigin::Automation {
                print_report(&report);
            }
        }
        EngineEvent::Notification(message) => println!(">> {}", message),
    }
}

/// Run backend work off the input loop.
fn spawn_task<F, Fut>(engine: &Arc<SwitchEngine>, work: F)
where
    F: FnOnce(Arc<SwitchEngine>) -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(work(engine.clone()));
}

async fn handle(session: &Session, command: Command) -> Flow {
    let engine = &session.engine;
    match command {
        Command::Help => println!("{}", HELP),
        Command::Status => print_status(&engine.status()),
        Command::Interfaces => match engine.rescan_interfaces().await {
            Ok(rows) => print_interfaces(&rows),
            Err(e) => println!("Scan failed: {}", e),
        },
        Command::Select { target, on } => {
            if target.eq_ignore_ascii_case("all") {
                engine.select_all(on);
            } else if let Err(e) = engine.set_interface_selected(&target, on) {
                println!("{}", e);
                return Flow::Continue;
            }
            print_interfaces(&engine.interfaces());
        }
        Command::Profiles => print_profiles(engine),
        Command::Profile(name) => match engine.select_profile(&name) {
            Ok(profile) => println!("Fallback profile: {}", profile),
            Err(e) => println!("{}", e),
        },
        Command::Apply { profile, force } => spawn_task(engine, |engine| async move {
            match engine.apply_manual(&profile, force).await {
                Ok(Some(report)) => print_report(&report),
                Ok(None) => {}
                Err(e) if e.is_conflict() => println!("Try later: {}", e),
                Err(e) => println!("Apply failed: {}", e),
            }
        }),
        Command::Auto(on) => {
            if on {
                engine.enable();
            } else {
                engine.disable();
            }
            println!("Automatic switching {}", on_off(engine.is_enabled()));
        }
        Command::Interval(secs) => {
            let period = engine.set_poll_interval(secs);
            println!("Poll interval {}s", period.as_secs());
        }
        Command::Rules => print_rules(session),
        Command::Reload => println!("{} rule(s) loaded", engine.reload_rules()),
        Command::Show => spawn_task(engine, |engine| async move {
            match engine.show_current_dns().await {
                Ok(results) => print_current_dns(&results),
                Err(e) => println!("{}", e),
            }
        }),
        Command::Flush => spawn_task(engine, |engine| async move {
            if let Err(e) = engine.flush_resolver_cache().await {
                println!("{}", e);
            }
        }),
        Command::Probe => spawn_task(engine, |engine| async move {
            match engine.probe_latency().await {
                Ok(report) => print_probe(&report),
                Err(e) => println!("{}", e),
            }
        }),
        Command::Log => {
            for entry in engine.activity_log().entries() {
                println!("{}", entry);
            }
        }
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}
