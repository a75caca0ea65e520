// AutoDNS - Error Types
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Shared error types for AutoDNS.

use thiserror::Error;

/// Result type alias for AutoDNS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for AutoDNS operations.
#[derive(Debug, Error)]
pub enum Error {
    // ========================================
    // Profile Errors
    // ========================================
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    // ========================================
    // Engine Errors
    // ========================================
    #[error("Automatic switching is active; disable it before applying manually")]
    AutomationActive,

    #[error("Another DNS operation is in progress, try again later")]
    Busy,

    #[error("No network interface selected")]
    NoInterfacesSelected,

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    // ========================================
    // Backend Errors
    // ========================================
    #[error("Interface {0} has no index and cannot be addressed this way")]
    InterfaceUnaddressable(String),

    #[error("Command failed: {command} - {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("D-Bus error: {0}")]
    Dbus(String),

    #[error("Backend operation failed: {operation} - {reason}")]
    Backend { operation: String, reason: String },

    #[error("Latency probe failed: {0}")]
    ProbeFailed(String),

    // ========================================
    // Validation Errors
    // ========================================
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    // ========================================
    // Storage Errors
    // ========================================
    #[error("Failed to write configuration: {0}")]
    ConfigWriteFailed(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParseFailed(String),

    // ========================================
    // System Errors
    // ========================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new command failed error.
    pub fn command_failed(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create a new backend error.
    pub fn backend(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error is a "try later" conflict with other work.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AutomationActive | Self::Busy)
    }
}

// Convert from zbus errors
impl From<zbus::Error> for Error {
    fn from(err: zbus::Error) -> Self {
        Error::Dbus(err.to_string())
    }
}

// Convert from toml parse errors
impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParseFailed(err.to_string())
    }
}

// Convert from toml serialize errors
impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigWriteFailed(err.to_string())
    }
}

// Convert from serde_json errors; I/O failures keep their io::Error
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.into())
        } else {
            Error::ConfigParseFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert!(Error::Busy.is_conflict());
        assert!(Error::AutomationActive.is_conflict());
        assert!(!Error::NoInterfacesSelected.is_conflict());
        assert!(!Error::command_failed("resolvectl", "exit 1").is_conflict());
    }

    struct BrokenPipe;

    impl std::io::Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_errors_classified() {
        let syntax = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        assert!(matches!(Error::from(syntax), Error::ConfigParseFailed(_)));

        let io = serde_json::to_writer(BrokenPipe, &[1, 2, 3]).unwrap_err();
        match Error::from(io) {
            Error::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {:?}", other),
        }
    }
}
