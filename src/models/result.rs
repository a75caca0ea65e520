// AutoDNS - Apply Results
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Result types for applying a profile to a set of interfaces.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::interface::InterfaceItem;
use super::profile::DnsProfile;

/// Who asked for a configuration change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyOrigin {
    /// The periodic switching loop.
    Automation,
    /// An explicit user command.
    User,
}

impl ApplyOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automation => "automation",
            Self::User => "user",
        }
    }
}

/// (profile, interface set) key used to detect redundant applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplySignature {
    pub profile: String,
    pub interfaces: BTreeSet<String>,
}

impl ApplySignature {
    pub fn new(profile: &DnsProfile, interfaces: &[InterfaceItem]) -> Self {
        Self {
            profile: profile.name.to_string(),
            interfaces: interfaces.iter().map(|i| i.id.clone()).collect(),
        }
    }
}

impl fmt::Display for ApplySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.interfaces.iter().map(String::as_str).collect();
        write!(f, "{} [{}]", self.profile, ids.join(", "))
    }
}

/// Outcome classification of one backend step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Primary method succeeded.
    Success,
    /// Primary failed, fallback succeeded.
    FallbackUsed,
    /// Both methods failed (or the step has no fallback and failed).
    Failed,
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::FallbackUsed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::FallbackUsed => "fallback",
            Self::Failed => "failed",
        }
    }
}

/// Backend step performed on an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStep {
    ResetToDhcp,
    EnableIpv6,
    Ipv4Servers,
    Ipv6Servers,
}

impl ApplyStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResetToDhcp => "reset to DHCP",
            Self::EnableIpv6 => "enable IPv6",
            Self::Ipv4Servers => "IPv4 servers",
            Self::Ipv6Servers => "IPv6 servers",
        }
    }

    /// Best-effort steps never decide the interface status.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::EnableIpv6)
    }
}

/// Result of one step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub step: ApplyStep,
    pub outcome: StepOutcome,
    /// Error text of the failed method(s).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregate status for an interface or a whole apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStatus {
    /// Every required step succeeded.
    Success,
    /// Some required steps succeeded, some failed.
    Partial,
    /// No required step succeeded.
    Failed,
}

impl ApplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Everything that happened on one interface.
#[derive(Debug, Clone, Serialize)]
pub struct InterfaceOutcome {
    pub interface: InterfaceItem,
    pub steps: Vec<StepResult>,
}

impl InterfaceOutcome {
    pub fn new(interface: InterfaceItem) -> Self {
        Self {
            interface,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, step: ApplyStep, outcome: StepOutcome, detail: Option<String>) {
        self.steps.push(StepResult {
            step,
            outcome,
            detail,
        });
    }

    /// Outcome of a given step, if it ran.
    pub fn step(&self, step: ApplyStep) -> Option<StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| s.outcome)
    }

    pub fn status(&self) -> ApplyStatus {
        let required: Vec<_> = self.steps.iter().filter(|s| !s.step.is_best_effort()).collect();
        let ok = required.iter().filter(|s| s.outcome.is_success()).count();
        if required.is_empty() || ok == 0 {
            ApplyStatus::Failed
        } else if ok == required.len() {
            ApplyStatus::Success
        } else {
            ApplyStatus::Partial
        }
    }
}

/// Overall result of applying a profile.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub profile: DnsProfile,
    pub origin: ApplyOrigin,
    pub status: ApplyStatus,
    pub message: String,
    pub interfaces: Vec<InterfaceOutcome>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ApplyReport {
    pub fn new(profile: DnsProfile, origin: ApplyOrigin) -> Self {
        let now = Utc::now();
        Self {
            profile,
            origin,
            status: ApplyStatus::Failed,
            message: String::new(),
            interfaces: Vec::new(),
            started_at: now,
            completed_at: now,
        }
    }

    /// Finalize the report, calculating the overall status.
    pub fn finalize(&mut self) {
        self.completed_at = Utc::now();

        let total = self.interfaces.len();
        let ok = self
            .interfaces
            .iter()
            .filter(|i| i.status() == ApplyStatus::Success)
            .count();
        let failed = self
            .interfaces
            .iter()
            .filter(|i| i.status() == ApplyStatus::Failed)
            .count();

        if total > 0 && ok == total {
            self.status = ApplyStatus::Success;
            self.message = format!("{} applied to {} interface(s)", self.profile.name, total);
        } else if total == 0 || failed == total {
            self.status = ApplyStatus::Failed;
            self.message = format!("{} could not be applied", self.profile.name);
        } else {
            self.status = ApplyStatus::Partial;
            self.message = format!(
                "{} applied to {} of {} interface(s)",
                self.profile.name,
                total - failed,
                total
            );
        }
    }

    /// Whether at least one required step succeeded somewhere.
    pub fn any_success(&self) -> bool {
        self.interfaces
            .iter()
            .any(|i| i.status() != ApplyStatus::Failed)
    }

    /// Outcome for an interface id.
    pub fn interface(&self, id: &str) -> Option<&InterfaceOutcome> {
        self.interfaces.iter().find(|i| i.interface.id == id)
    }

    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}
