// AutoDNS - Process Watcher
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Running-process scan for program rules.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tracing::debug;

use crate::models::rules::path_key;
use crate::models::ProgramRule;

/// Source of executable paths of running processes.
pub trait ProcessSource: Send + Sync {
    /// Executable paths of processes that could be inspected.
    fn executable_paths(&self) -> Vec<PathBuf>;
}

/// Process source backed by `sysinfo`.
pub struct SysinfoSource {
    system: Mutex<System>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_with_specifics(
                RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing().with_exe(
                    sysinfo::UpdateKind::OnlyIfNotSet,
                )),
            )),
        }
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSource for SysinfoSource {
    fn executable_paths(&self) -> Vec<PathBuf> {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing().with_exe(sysinfo::UpdateKind::OnlyIfNotSet),
        );
        // Processes we may not inspect have no exe and are skipped.
        system
            .processes()
            .values()
            .filter_map(|process| process.exe().map(PathBuf::from))
            .collect()
    }
}

/// Finds the highest-priority rule whose program is running.
pub struct ProcessWatcher {
    source: Box<dyn ProcessSource>,
}

impl ProcessWatcher {
    pub fn new(source: Box<dyn ProcessSource>) -> Self {
        Self { source }
    }

    pub fn system() -> Self {
        Self::new(Box::new(SysinfoSource::new()))
    }

    /// First rule, in list order, with a matching running process.
    pub fn first_match(&self, rules: &[ProgramRule]) -> Option<ProgramRule> {
        if rules.is_empty() {
            return None;
        }

        let running: HashSet<String> = self
            .source
            .executable_paths()
            .iter()
            .map(|path| path_key(path))
            .collect();
        debug!("Process scan: {} distinct executable(s)", running.len());

        rules.iter().find(|rule| running.contains(&rule.key)).cloned()
    }
}
