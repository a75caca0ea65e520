// AutoDNS - Profile Catalog
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Profile catalog and program rule table.
//!
//! Profiles are fixed. Rules come from a JSON file and can be reloaded at any
//! time; readers hold an `Arc` snapshot, so a reload is never observed half
//! done.

use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use crate::models::profile::{self, ALL_PROFILES};
use crate::models::{DnsProfile, Error, ProgramRule, Result};

/// Profiles plus the hot-reloadable rule table.
#[derive(Debug)]
pub struct ProfileCatalog {
    rules_path: PathBuf,
    rules: RwLock<Arc<[ProgramRule]>>,
    /// Modification time seen at the last load, `None` if the file was absent.
    loaded_stamp: Mutex<Option<SystemTime>>,
}

impl ProfileCatalog {
    /// Create a catalog and load rules from `rules_path`.
    pub fn new(rules_path: impl Into<PathBuf>) -> Self {
        let catalog = Self {
            rules_path: rules_path.into(),
            rules: RwLock::new(Arc::from(Vec::new())),
            loaded_stamp: Mutex::new(None),
        };
        catalog.reload_rules();
        catalog
    }

    /// Look up a profile by name.
    pub fn resolve(&self, name: &str) -> Result<DnsProfile> {
        profile::lookup(name).ok_or_else(|| Error::ProfileNotFound(name.trim().to_string()))
    }

    /// All profiles in display order.
    pub fn profiles(&self) -> &'static [DnsProfile] {
        &ALL_PROFILES
    }

    /// Current rule snapshot in priority order.
    pub fn rules(&self) -> Arc<[ProgramRule]> {
        match self.rules.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Reload the rule file and swap the table in. Returns the rule count.
    ///
    /// A missing or malformed file yields an empty table.
    pub fn reload_rules(&self) -> usize {
        let stamp = modified_time(&self.rules_path);
        let rules = match load_rules_from(&self.rules_path) {
            Ok(rules) => {
                info!(
                    "Loaded {} program rule(s) from {:?}",
                    rules.len(),
                    self.rules_path
                );
                rules
            }
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No rule file at {:?}", self.rules_path);
                Vec::new()
            }
            Err(e) => {
                warn!("Ignoring rule file {:?}: {}", self.rules_path, e);
                Vec::new()
            }
        };

        let count = rules.len();
        let table: Arc<[ProgramRule]> = Arc::from(rules);
        match self.rules.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
        match self.loaded_stamp.lock() {
            Ok(mut guard) => *guard = stamp,
            Err(poisoned) => *poisoned.into_inner() = stamp,
        }
        count
    }

    /// Reload if the file changed, appeared or vanished since the last load.
    pub fn refresh_if_modified(&self) -> bool {
        let current = modified_time(&self.rules_path);
        let previous = match self.loaded_stamp.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        };
        if current == previous {
            return false;
        }
        info!("Rule file changed, reloading");
        self.reload_rules();
        true
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Read and parse a rule file.
pub fn load_rules_from(path: &Path) -> Result<Vec<ProgramRule>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    parse_rules(&value)
}

/// Turn a parsed rule document into an ordered rule list.
///
/// Accepts `{ "<path>": "<profile>" }` (key order is priority) or
/// `[{ "path": ..., "profile": ... }]`.
pub fn parse_rules(value: &Value) -> Result<Vec<ProgramRule>> {
    let pairs: Vec<(Option<&str>, Option<&str>)> = match value {
        Value::Object(map) => map
            .iter()
            .map(|(path, profile)| (Some(path.as_str()), profile.as_str()))
            .collect(),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                let field = |a: &str, b: &str| {
                    item.get(a)
                        .or_else(|| item.get(b))
                        .and_then(Value::as_str)
                };
                (field("path", "ProgramPath"), field("profile", "Profile"))
            })
            .collect(),
        _ => {
            return Err(Error::ConfigParseFailed(
                "rule file must be a JSON object or array".to_string(),
            ))
        }
    };

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(pairs.len());
    for (index, (path, profile_name)) in pairs.into_iter().enumerate() {
        let Some(path) = path.map(str::trim).filter(|p| !p.is_empty()) else {
            warn!("Rule #{}: missing program path, skipped", index + 1);
            continue;
        };
        let Some(profile_name) = profile_name else {
            warn!("Rule #{} ({}): missing profile name, skipped", index + 1, path);
            continue;
        };
        let Some(target) = profile::lookup(profile_name) else {
            warn!(
                "Rule #{} ({}): unknown profile '{}', skipped",
                index + 1,
                path,
                profile_name
            );
            continue;
        };

        let rule = ProgramRule::new(path, target);
        if !seen.insert(rule.key.clone()) {
            warn!("Rule #{} ({}): duplicate path, skipped", index + 1, path);
            continue;
        }
        rules.push(rule);
    }
    Ok(rules)
}
