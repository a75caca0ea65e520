// AutoDNS - Activity Log
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Session audit trail.
//!
//! Every configuration step is recorded here with an outcome tag. The ring is
//! append-only and bounded: once full, the oldest entry is dropped. Entries
//! are mirrored to `tracing` as they are written.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::models::StepOutcome;

/// Outcome tag shown next to every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTag {
    Info,
    Success,
    Fallback,
    Failed,
    Skip,
}

impl LogTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Fallback => "fallback",
            Self::Failed => "failed",
            Self::Skip => "skip",
        }
    }

    fn level(&self) -> &'static str {
        match self {
            Self::Info | Self::Success => "INFO",
            Self::Skip => "DEBUG",
            Self::Fallback => "WARN",
            Self::Failed => "ERROR",
        }
    }
}

impl From<StepOutcome> for LogTag {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Success => Self::Success,
            StepOutcome::FallbackUsed => Self::Fallback,
            StepOutcome::Failed => Self::Failed,
        }
    }
}

/// A log entry with timestamp, level, tag and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: String,
    #[serde(default = "default_tag")]
    pub tag: LogTag,
    pub message: String,
}

fn default_tag() -> LogTag {
    LogTag::Info
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:<8}] {}",
            self.timestamp,
            self.tag.as_str(),
            self.message
        )
    }
}

/// Bounded in-memory log shared by the engine and coordinator.
#[derive(Debug)]
pub struct ActivityLog {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Append an entry, dropping the oldest one if full.
    pub fn push(&self, tag: LogTag, message: impl Into<String>) {
        let message = message.into();
        match tag {
            LogTag::Info | LogTag::Success => info!("[{}] {}", tag.as_str(), message),
            LogTag::Skip => debug!("[{}] {}", tag.as_str(), message),
            LogTag::Fallback => warn!("[{}] {}", tag.as_str(), message),
            LogTag::Failed => error!("[{}] {}", tag.as_str(), message),
        }

        let entry = LogEntry {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            level: tag.level().to_string(),
            tag,
            message,
        };

        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogTag::Info, message);
    }

    pub fn skip(&self, message: impl Into<String>) {
        self.push(LogTag::Skip, message);
    }

    /// Snapshot of the current entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(guard) => guard.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_entries_dropped_at_capacity() {
        let log = ActivityLog::new(3);
        for i in 0..5 {
            log.info(format!("entry {}", i));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "entry 2");
        assert_eq!(entries[2].message, "entry 4");
    }

    #[test]
    fn test_tag_from_outcome() {
        assert_eq!(LogTag::from(StepOutcome::FallbackUsed), LogTag::Fallback);
        let log = ActivityLog::new(10);
        log.push(StepOutcome::Failed.into(), "eth0 IPv6 servers");
        let entry = &log.entries()[0];
        assert_eq!(entry.tag, LogTag::Failed);
        assert_eq!(entry.level, "ERROR");
    }

    #[test]
    fn test_entry_without_tag_deserializes() {
        let entry: LogEntry = serde_json::from_str(
            r#"{"timestamp":"2026-01-01 00:00:00","level":"INFO","message":"hello"}"#,
        )
        .unwrap();
        assert_eq!(entry.tag, LogTag::Info);
    }
}
