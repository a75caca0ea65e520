// AutoDNS - Application Configuration
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Application configuration model.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use super::schema::SchemaVersion;
use super::validation::validate_hostname;

/// Lowest accepted poll interval. Anything shorter is clamped up.
pub const MIN_POLL_INTERVAL_SECS: u64 = 3;

/// Latency probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Domains resolved against every profile.
    #[serde(default = "default_probe_domains")]
    pub domains: Vec<String>,

    /// Timed lookups per (domain, profile) pair.
    #[serde(default = "default_probe_samples")]
    pub samples: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            domains: default_probe_domains(),
            samples: default_probe_samples(),
        }
    }
}

impl ProbeConfig {
    /// Domains that pass hostname validation, lowercased.
    pub fn valid_domains(&self) -> Vec<String> {
        self.domains
            .iter()
            .filter_map(|d| match validate_hostname(d) {
                Ok(d) => Some(d),
                Err(e) => {
                    warn!("Ignoring probe domain: {}", e);
                    None
                }
            })
            .collect()
    }
}

fn default_probe_domains() -> Vec<String> {
    vec![
        "www.google.com".to_string(),
        "www.youtube.com".to_string(),
        "github.com".to_string(),
        "www.wikipedia.org".to_string(),
    ]
}

fn default_probe_samples() -> u32 {
    3
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Schema version of this file.
    #[serde(default)]
    pub schema_version: SchemaVersion,

    /// Automatic switching poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Automatic switching was enabled when the last session ended.
    #[serde(default)]
    pub automation_enabled: bool,

    /// Last manually selected profile (automation fallback target).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_manual_profile: Option<String>,

    /// Rule file override. Defaults to `programs.json` in the config dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<PathBuf>,

    /// Offer PPP and unknown adapter types for selection.
    #[serde(default)]
    pub include_advanced_interfaces: bool,

    /// Flush the resolver cache after every successful apply.
    #[serde(default)]
    pub flush_after_apply: bool,

    /// Re-apply when live DNS no longer matches the last applied profile.
    #[serde(default)]
    pub reassert_on_drift: bool,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Maximum activity log entries to keep.
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// Latency probe settings.
    #[serde(default)]
    pub probe: ProbeConfig,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_entries() -> usize {
    1000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: SchemaVersion::current(),
            poll_interval_secs: default_poll_interval(),
            automation_enabled: false,
            last_manual_profile: None,
            rules_file: None,
            include_advanced_interfaces: false,
            flush_after_apply: false,
            reassert_on_drift: false,
            log_level: default_log_level(),
            max_log_entries: default_max_log_entries(),
            probe: ProbeConfig::default(),
        }
    }
}

/// Clamp a poll interval to the supported minimum.
pub fn clamp_poll_interval(secs: u64) -> u64 {
    secs.max(MIN_POLL_INTERVAL_SECS)
}

impl AppConfig {
    /// Poll interval with the minimum enforced.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(clamp_poll_interval(self.poll_interval_secs))
    }

    /// Load configuration from TOML file.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, super::Error> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;
        config.poll_interval_secs = clamp_poll_interval(config.poll_interval_secs);
        config.max_log_entries = config.max_log_entries.max(1);
        Ok(config)
    }

    /// Save configuration to TOML file with restrictive permissions (0600).
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), super::Error> {
        let mut stamped = self.clone();
        stamped.schema_version = SchemaVersion::current();
        let content = toml::to_string_pretty(&stamped)?;
        std::fs::write(path, content)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
        }
        Ok(())
    }
}
