// AutoDNS - Local Storage
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Local data storage.
//!
//! Handles:
//! - Application settings (`settings.toml`)
//! - Activity log history (`logs.json`)
//! - Location of the program rule file
//!
//! This module uses RwLock for thread-safe access. Lock poisoning is handled
//! gracefully by recovering the inner value, as poison indicates a panic
//! in another thread but the data itself may still be valid.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{error, info, warn};

use crate::models::schema::SchemaCheck;
use crate::models::{AppConfig, Error, Result, CONFIG_DIR_NAME, RULES_FILE_NAME};
use crate::services::LogEntry;

/// Settings and log persistence.
#[derive(Debug)]
pub struct DataStore {
    /// Configuration directory path.
    config_dir: PathBuf,
    /// Settings file path.
    settings_file: PathBuf,
    /// Log file path.
    logs_file: PathBuf,

    /// Application settings.
    settings: RwLock<AppConfig>,
}

impl DataStore {
    /// Create a new data store with default config directory.
    pub fn new() -> Self {
        Self::with_config_dir(default_config_dir())
    }

    /// Create a new data store with a specific config directory.
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        // Create directory if it doesn't exist
        if let Err(e) = fs::create_dir_all(&config_dir) {
            error!("Failed to create config directory: {}", e);
        }
        // Set restrictive permissions on the config directory (0700)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&config_dir, fs::Permissions::from_mode(0o700));
        }

        let store = Self {
            settings_file: config_dir.join("settings.toml"),
            logs_file: config_dir.join("logs.json"),
            config_dir,
            settings: RwLock::new(AppConfig::default()),
        };

        store.load_settings();
        store
    }

    // ========================================================================
    // RwLock Helper Methods (handle poisoning gracefully)
    // ========================================================================

    fn read_settings<R>(&self, reader: impl FnOnce(&AppConfig) -> R) -> R {
        match self.settings.read() {
            Ok(guard) => reader(&guard),
            Err(poisoned) => {
                warn!("RwLock poisoned reading settings, recovering");
                reader(&poisoned.into_inner())
            }
        }
    }

    fn write_settings(&self, writer: impl FnOnce(&mut AppConfig)) {
        match self.settings.write() {
            Ok(mut guard) => writer(&mut guard),
            Err(poisoned) => {
                warn!("RwLock poisoned writing settings, recovering");
                writer(&mut poisoned.into_inner())
            }
        }
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Load settings from disk.
    fn load_settings(&self) {
        if !self.settings_file.exists() {
            return;
        }
        match AppConfig::load_from_file(&self.settings_file) {
            Ok(config) => {
                match config.schema_version.check() {
                    SchemaCheck::Current => {}
                    SchemaCheck::Upgradable => info!(
                        "Upgrading settings from schema {}",
                        config.schema_version
                    ),
                    SchemaCheck::Incompatible => warn!(
                        "Settings schema {} is not supported, unknown fields are ignored",
                        config.schema_version
                    ),
                }
                self.write_settings(|s| *s = config);
                info!("Loaded settings from {:?}", self.settings_file);
            }
            Err(e) => {
                error!("Failed to load settings: {}", e);
            }
        }
    }

    /// Get the current settings.
    pub fn settings(&self) -> AppConfig {
        self.read_settings(|s| s.clone())
    }

    /// Replace the settings and save them.
    pub fn update_settings(&self, settings: AppConfig) -> Result<()> {
        self.write_settings(|s| *s = settings.clone());
        settings.save_to_file(&self.settings_file)
    }

    /// Modify the settings in place and save them.
    pub fn modify_settings(&self, change: impl FnOnce(&mut AppConfig)) -> Result<()> {
        let mut settings = self.settings();
        change(&mut settings);
        self.update_settings(settings)
    }

    /// Path of the program rule file.
    pub fn rules_file(&self) -> PathBuf {
        self.read_settings(|s| s.rules_file.clone())
            .unwrap_or_else(|| self.config_dir.join(RULES_FILE_NAME))
    }

    // ========================================================================
    // Logs
    // ========================================================================

    /// Load persisted log entries.
    pub fn logs(&self) -> Vec<LogEntry> {
        if !self.logs_file.exists() {
            return Vec::new();
        }

        match File::open(&self.logs_file) {
            Ok(file) => {
                let reader = BufReader::new(file);
                match serde_json::from_reader::<_, Vec<LogEntry>>(reader) {
                    Ok(entries) => entries,
                    Err(e) => {
                        error!("Failed to parse logs file: {}", e);
                        Vec::new()
                    }
                }
            }
            Err(e) => {
                error!("Failed to open logs file: {}", e);
                Vec::new()
            }
        }
    }

    /// Append a session's entries to the persisted log, keeping the newest
    /// `max_log_entries`.
    pub fn append_logs(&self, entries: &[LogEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut logs = self.logs();
        logs.extend_from_slice(entries);

        let max_entries = self.read_settings(|s| s.max_log_entries);
        if logs.len() > max_entries {
            let drain_count = logs.len() - max_entries;
            logs.drain(0..drain_count);
        }
        self.save_logs(&logs)
    }

    /// Clear all logs.
    pub fn clear_logs(&self) -> Result<()> {
        self.save_logs(&[])
    }

    fn save_logs(&self, logs: &[LogEntry]) -> Result<()> {
        let file = File::create(&self.logs_file)?;
        // Set restrictive permissions on log file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.logs_file, fs::Permissions::from_mode(0o600));
        }
        write_logs(BufWriter::new(file), logs)
    }

    /// Get the config directory path.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_logs(writer: impl Write, logs: &[LogEntry]) -> Result<()> {
    serde_json::to_writer_pretty(writer, logs)
        .map_err(|e| Error::ConfigWriteFailed(format!("activity log: {}", e)))
}

/// `$XDG_CONFIG_HOME/autodns`, or `./autodns` if there is no config dir.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}
