// AutoDNS - Apply Coordinator
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Drives backend calls for one profile over a set of interfaces.
//!
//! Every step is tried with the primary method first and the fallback method
//! once if that fails. Interfaces are processed in the order given; within an
//! interface IPv4 goes before IPv6, and both are always attempted.

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use super::activity_log::{ActivityLog, LogTag};
use crate::backend::{IpFamily, Method, NetworkBackend};
use crate::models::{
    ApplyOrigin, ApplyReport, ApplyStatus, ApplyStep, DnsProfile, InterfaceItem,
    InterfaceOutcome, ProfileKind, Result, StaticServers, StepOutcome,
};

pub struct ApplyCoordinator {
    backend: Arc<dyn NetworkBackend>,
    log: Arc<ActivityLog>,
    flush_after_apply: bool,
}

impl ApplyCoordinator {
    pub fn new(backend: Arc<dyn NetworkBackend>, log: Arc<ActivityLog>) -> Self {
        Self {
            backend,
            log,
            flush_after_apply: false,
        }
    }

    /// Flush the resolver cache after every apply that changed something.
    pub fn with_flush_after_apply(mut self, enabled: bool) -> Self {
        self.flush_after_apply = enabled;
        self
    }

    pub fn backend(&self) -> &Arc<dyn NetworkBackend> {
        &self.backend
    }

    /// Apply `profile` to `interfaces`.
    pub async fn apply(
        &self,
        profile: DnsProfile,
        interfaces: &[InterfaceItem],
        origin: ApplyOrigin,
    ) -> ApplyReport {
        let mut report = ApplyReport::new(profile, origin);
        self.log.info(format!(
            "Applying {} to {} interface(s) ({})",
            profile.name,
            interfaces.len(),
            origin.as_str()
        ));

        for interface in interfaces {
            let outcome = match &profile.kind {
                ProfileKind::Dhcp => self.apply_dhcp(interface).await,
                ProfileKind::Static(servers) => self.apply_static(interface, servers).await,
            };
            report.interfaces.push(outcome);
        }

        report.finalize();

        if self.flush_after_apply && report.any_success() {
            self.flush().await;
        }

        let tag = match report.status {
            ApplyStatus::Success => LogTag::Success,
            ApplyStatus::Partial | ApplyStatus::Failed => LogTag::Failed,
        };
        self.log.push(
            tag,
            format!("{} ({} ms)", report.message, report.duration_ms()),
        );
        report
    }

    /// Flush the resolver cache with fallback. Returns the outcome.
    pub async fn flush(&self) -> StepOutcome {
        let backend = &self.backend;
        let (outcome, _) = self
            .run_step("resolver cache", "flush", |method| {
                backend.flush_resolver_cache(method)
            })
            .await;
        outcome
    }

    async fn apply_dhcp(&self, interface: &InterfaceItem) -> InterfaceOutcome {
        let mut outcome = InterfaceOutcome::new(interface.clone());
        let backend = &self.backend;

        let label = interface.to_string();
        let (result, detail) = self
            .run_step(&label, ApplyStep::ResetToDhcp.as_str(), |method| {
                backend.reset_to_dhcp(interface, method)
            })
            .await;
        outcome.record(ApplyStep::ResetToDhcp, result, detail);

        if result.is_success() {
            match backend.query_current_dns(interface).await {
                Ok(dns) => self.log.info(format!(
                    "{} now uses IPv4 {} / IPv6 {}",
                    interface.name,
                    dns.describe(IpFamily::V4),
                    dns.describe(IpFamily::V6)
                )),
                Err(e) => debug!("Could not read back DNS on {}: {}", interface.name, e),
            }
        }
        outcome
    }

    async fn apply_static(
        &self,
        interface: &InterfaceItem,
        servers: &StaticServers,
    ) -> InterfaceOutcome {
        let mut outcome = InterfaceOutcome::new(interface.clone());
        let label = interface.to_string();

        match self.backend.ensure_ipv6_enabled(interface).await {
            Ok(changed) => {
                if changed {
                    self.log.info(format!("{}: IPv6 enabled", label));
                }
                outcome.record(ApplyStep::EnableIpv6, StepOutcome::Success, None);
            }
            Err(e) => {
                self.log.push(
                    LogTag::Failed,
                    format!("{}: could not enable IPv6, continuing: {}", label, e),
                );
                outcome.record(ApplyStep::EnableIpv6, StepOutcome::Failed, Some(e.to_string()));
            }
        }

        for (step, family, list) in [
            (ApplyStep::Ipv4Servers, IpFamily::V4, servers.ipv4()),
            (ApplyStep::Ipv6Servers, IpFamily::V6, servers.ipv6()),
        ] {
            let (result, detail) = self.set_family(interface, &label, step, family, &list).await;
            outcome.record(step, result, detail);
        }
        outcome
    }

    async fn set_family(
        &self,
        interface: &InterfaceItem,
        label: &str,
        step: ApplyStep,
        family: IpFamily,
        list: &[IpAddr],
    ) -> (StepOutcome, Option<String>) {
        let backend = &self.backend;
        let rendered: Vec<String> = list.iter().map(ToString::to_string).collect();
        let action = format!("{} -> {}", step.as_str(), rendered.join(", "));
        self.run_step(label, &action, |method| {
            backend.set_servers(interface, family, list, method)
        })
        .await
    }

    /// Run `op` with the primary method, then once with the fallback.
    async fn run_step<F, Fut>(
        &self,
        target: &str,
        action: &str,
        op: F,
    ) -> (StepOutcome, Option<String>)
    where
        F: Fn(Method) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        self.log.info(format!("{}: {}", target, action));
        let backend = self.backend.name();

        debug!(
            "{}: {} via {} {} method",
            target,
            action,
            backend,
            Method::Primary.as_str()
        );
        let primary_err = match op(Method::Primary).await {
            Ok(()) => {
                self.log
                    .push(LogTag::Success, format!("{}: {} done", target, action));
                return (StepOutcome::Success, None);
            }
            Err(e) => e,
        };
        debug!(
            "{}: {} method failed, trying {}: {}",
            target,
            Method::Primary.as_str(),
            Method::Fallback.as_str(),
            primary_err
        );
        match op(Method::Fallback).await {
            Ok(()) => {
                self.log.push(
                    LogTag::Fallback,
                    format!(
                        "{}: {} done via fallback (primary: {})",
                        target, action, primary_err
                    ),
                );
                (StepOutcome::FallbackUsed, Some(primary_err.to_string()))
            }
            Err(fallback_err) => {
                let detail = format!("primary: {}; fallback: {}", primary_err, fallback_err);
                self.log
                    .push(LogTag::Failed, format!("{}: {} failed ({})", target, action, detail));
                (StepOutcome::Failed, Some(detail))
            }
        }
    }
}
