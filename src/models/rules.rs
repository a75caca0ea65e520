// AutoDNS - Program Rules
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Program rules for automatic profile switching.
//!
//! A rule binds an executable's full path to a profile. Rules are kept in
//! priority order: the first rule whose program is running wins, regardless
//! of which later rules also match.
//!
//! ## Path matching
//!
//! Paths are compared through [`path_key`]: made absolute, stripped of
//! trailing separators and lowercased. The same function is applied to rule
//! paths at load time and to live process paths at scan time.

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::profile::DnsProfile;

/// Suffix the kernel appends to `/proc/<pid>/exe` once the binary was replaced.
const DELETED_SUFFIX: &str = " (deleted)";

/// One (program, profile) binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramRule {
    /// Normalized executable path, as shown to the user.
    pub path: PathBuf,
    /// Comparison key derived from `path`.
    #[serde(skip)]
    pub key: String,
    /// Target profile.
    pub profile: DnsProfile,
}

impl ProgramRule {
    pub fn new(path: impl AsRef<Path>, profile: DnsProfile) -> Self {
        let path = normalize_path(path.as_ref());
        let key = key_of_normalized(&path);
        Self { path, key, profile }
    }

    /// Whether `key` (from [`path_key`]) refers to this rule's program.
    pub fn matches_key(&self, key: &str) -> bool {
        self.key == key
    }
}

/// Whether a path is absolute in either Windows or Unix notation.
fn looks_absolute(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    raw.starts_with('/')
        || raw.starts_with('\\')
        || (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
}

/// Make a path absolute and strip trailing separators.
///
/// Falls back to the trimmed input when the path cannot be made absolute.
pub fn normalize_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    let raw = raw.trim();
    let raw = raw.strip_suffix(DELETED_SUFFIX).unwrap_or(raw);

    let absolute = if looks_absolute(raw) {
        raw.to_string()
    } else {
        match std::path::absolute(raw) {
            Ok(abs) => abs.to_string_lossy().into_owned(),
            Err(_) => raw.to_string(),
        }
    };

    let trimmed = absolute.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        PathBuf::from(absolute)
    } else {
        PathBuf::from(trimmed)
    }
}

fn key_of_normalized(path: &Path) -> String {
    let key = path.to_string_lossy().to_lowercase();
    if cfg!(windows) {
        key.replace('/', "\\")
    } else {
        key
    }
}

/// Case-insensitive comparison key for an executable path.
pub fn path_key(path: &Path) -> String {
    key_of_normalized(&normalize_path(path))
}
