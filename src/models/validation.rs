// AutoDNS - Validation Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Input validation for user-supplied names.

use super::error::{Error, Result};

/// Validate a hostname, returning it lowercased.
pub fn validate_hostname(s: &str) -> Result<String> {
    let s = s.trim().trim_end_matches('.');
    if s.is_empty() || s.len() > 253 {
        return Err(Error::InvalidHostname(format!(
            "Hostname must be 1-253 characters: {}",
            s
        )));
    }

    for label in s.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(Error::InvalidHostname(format!(
                "Label must be 1-63 characters: {}",
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(Error::InvalidHostname(format!(
                "Invalid characters in label: {}",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::InvalidHostname(format!(
                "Label cannot start or end with hyphen: {}",
                label
            )));
        }
    }

    Ok(s.to_lowercase())
}
