// AutoDNS - Settings Schema Versioning
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Version stamp carried by `settings.toml`.

use semver::Version;
use serde::{Deserialize, Serialize};

/// Schema version written by this build.
pub const SETTINGS_SCHEMA_VERSION: &str = "1.1.0";

/// How a stored settings file relates to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCheck {
    /// Written by this schema version.
    Current,
    /// Older compatible schema; missing fields take their defaults.
    Upgradable,
    /// Newer or different major version, or unparseable.
    Incompatible,
}

/// Schema version wrapper for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn current() -> Self {
        Self(SETTINGS_SCHEMA_VERSION.to_string())
    }

    /// Compare against the schema this build writes.
    pub fn check(&self) -> SchemaCheck {
        let (Ok(found), Ok(current)) = (
            Version::parse(&self.0),
            Version::parse(SETTINGS_SCHEMA_VERSION),
        ) else {
            return SchemaCheck::Incompatible;
        };

        if found == current {
            SchemaCheck::Current
        } else if found.major == current.major && found < current {
            SchemaCheck::Upgradable
        } else {
            SchemaCheck::Incompatible
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
