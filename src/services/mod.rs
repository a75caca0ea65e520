// AutoDNS - Services
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Switching services.
//!
//! This module contains:
//! - Catalog: profiles and the hot-reloadable program rule table
//! - Watcher: running-process scan against the rules
//! - Coordinator: per-interface apply with primary/fallback methods
//! - Engine: the automatic switching state machine and busy gate
//! - Probe: resolver latency comparison
//! - Activity log: bounded audit trail of every step

pub mod activity_log;
pub mod catalog;
pub mod coordinator;
pub mod engine;
pub mod probe;
pub mod watcher;

pub use activity_log::{ActivityLog, LogEntry, LogTag};
pub use catalog::ProfileCatalog;
pub use coordinator::ApplyCoordinator;
pub use engine::{EngineEvent, EngineOptions, EngineStatus, SwitchEngine};
pub use probe::ProbeReport;
pub use watcher::ProcessWatcher;
