// AutoDNS - Data Models
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! # AutoDNS Models
//!
//! Shared types used by the switching engine and its front-ends:
//!
//! - **Profile**: the fixed set of named DNS configurations
//! - **Interface**: selectable adapters and the selection that survives rescans
//! - **Rules**: (program path, profile) bindings and path normalization
//! - **Result**: per-interface apply outcomes and the apply signature
//! - **Config**: persisted settings
//! - **Error**: shared error type

pub mod config;
pub mod error;
pub mod interface;
pub mod profile;
pub mod result;
pub mod rules;
pub mod schema;
pub mod validation;

pub use config::{AppConfig, ProbeConfig};
pub use error::{Error, Result};
pub use interface::{AdapterType, InterfaceItem, InterfaceSelection};
pub use profile::{DnsProfile, ProfileKind, StaticServers};
pub use result::{
    ApplyOrigin, ApplyReport, ApplySignature, ApplyStatus, ApplyStep, InterfaceOutcome,
    StepOutcome,
};
pub use rules::ProgramRule;

/// Configuration directory name (under XDG_CONFIG_HOME).
pub const CONFIG_DIR_NAME: &str = "autodns";

/// Default rule file name inside the config directory.
pub const RULES_FILE_NAME: &str = "programs.json";
