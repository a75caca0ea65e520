// AutoDNS - Switch Engine
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Automatic profile switching engine.
//!
//! The engine owns all mutable switching state behind one lock: phase,
//! enabled flag, busy flag, last applied signature, manual selection and the
//! interface selection. The lock covers scan-and-decide only; it is released
//! before the coordinator talks to the backend.
//!
//! ## Busy gate
//!
//! Only one cycle or manual operation may be in flight. Automatic ticks that
//! find the gate taken are dropped. Manual operations get [`Error::Busy`], or
//! [`Error::AutomationActive`] while automatic mode is on.
//!
//! ## Target resolution
//!
//! The first running program rule wins. Without a match the last manually
//! selected profile is used, and AdGuard if nothing was ever selected.

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, info, warn};

use super::activity_log::{ActivityLog, LogTag};
use super::catalog::ProfileCatalog;
use super::coordinator::ApplyCoordinator;
use super::probe::{LatencyProbe, ProbeReport};
use super::watcher::ProcessWatcher;
use crate::backend::{CurrentDns, IpFamily};
use crate::models::config::clamp_poll_interval;
use crate::models::profile::DEFAULT_PROFILE;
use crate::models::{
    ApplyOrigin, ApplyReport, ApplySignature, DnsProfile, Error, InterfaceItem,
    InterfaceSelection, ProbeConfig, ProgramRule, Result, StepOutcome,
};
use crate::scheduler::{spawn_periodic, SchedulerHandle};
use crate::storage::DataStore;

/// Engine phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePhase {
    Idle,
    Evaluating,
    Applying,
    Disabled,
}

impl EnginePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Evaluating => "evaluating",
            Self::Applying => "applying",
            Self::Disabled => "disabled",
        }
    }
}

/// Messages from the engine to whatever presents it.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Phase(EnginePhase),
    Applied(ApplyReport),
    /// Short summary of a user-triggered operation.
    Notification(String),
}

/// Result of one automatic cycle.
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Automatic mode is off.
    Disabled,
    /// Another operation held the gate; tick dropped.
    Busy,
    NoInterfaces,
    /// Target already applied.
    Unchanged(DnsProfile),
    Applied(ApplyReport),
}

/// Snapshot of engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub phase: EnginePhase,
    pub enabled: bool,
    pub busy: bool,
    /// Last profile selected by the user.
    pub manual_profile: Option<DnsProfile>,
    /// Last profile actually pushed to the system.
    pub connected_profile: Option<DnsProfile>,
    pub last_signature: Option<ApplySignature>,
    pub interfaces: Vec<(InterfaceItem, bool)>,
    pub poll_interval: Duration,
    pub rule_count: usize,
}

/// Construction options.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub poll_interval_secs: u64,
    pub include_advanced_interfaces: bool,
    pub reassert_on_drift: bool,
    pub manual_profile: Option<DnsProfile>,
    pub probe: ProbeConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            include_advanced_interfaces: false,
            reassert_on_drift: false,
            manual_profile: None,
            probe: ProbeConfig::default(),
        }
    }
}

struct EngineState {
    phase: EnginePhase,
    enabled: bool,
    busy: bool,
    last_signature: Option<ApplySignature>,
    manual_profile: Option<DnsProfile>,
    connected_profile: Option<DnsProfile>,
    selection: InterfaceSelection,
    poll_interval: Duration,
    scheduler: Option<SchedulerHandle>,
}

/// Clears the busy flag when dropped.
struct BusyGuard<'a> {
    engine: &'a SwitchEngine,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.engine.lock_state();
        state.busy = false;
        let phase = if state.enabled {
            EnginePhase::Idle
        } else {
            EnginePhase::Disabled
        };
        self.engine.set_phase(&mut state, phase);
        drop(state);
        self.engine.idle.notify_waiters();
    }
}

pub struct SwitchEngine {
    state: Mutex<EngineState>,
    idle: Notify,
    catalog: Arc<ProfileCatalog>,
    watcher: Arc<ProcessWatcher>,
    coordinator: ApplyCoordinator,
    log: Arc<ActivityLog>,
    store: Option<Arc<DataStore>>,
    include_advanced: bool,
    reassert_on_drift: bool,
    probe: ProbeConfig,
    events: mpsc::UnboundedSender<EngineEvent>,
    this: Weak<SwitchEngine>,
}

impl SwitchEngine {
    pub fn new(
        catalog: Arc<ProfileCatalog>,
        watcher: ProcessWatcher,
        coordinator: ApplyCoordinator,
        log: Arc<ActivityLog>,
        store: Option<Arc<DataStore>>,
        options: EngineOptions,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Arc::new_cyclic(|this| Self {
            state: Mutex::new(EngineState {
                phase: EnginePhase::Disabled,
                enabled: false,
                busy: false,
                last_signature: None,
                manual_profile: options.manual_profile,
                connected_profile: None,
                selection: InterfaceSelection::new(),
                poll_interval: Duration::from_secs(clamp_poll_interval(
                    options.poll_interval_secs,
                )),
                scheduler: None,
            }),
            idle: Notify::new(),
            catalog,
            watcher: Arc::new(watcher),
            coordinator,
            log,
            store,
            include_advanced: options.include_advanced_interfaces,
            reassert_on_drift: options.reassert_on_drift,
            probe: options.probe,
            events,
            this: this.clone(),
        });
        (engine, receiver)
    }

    // ========================================================================
    // State helpers
    // ========================================================================

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Engine state lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn set_phase(&self, state: &mut EngineState, phase: EnginePhase) {
        if state.phase != phase {
            state.phase = phase;
            self.emit(EngineEvent::Phase(phase));
        }
    }

    fn emit(&self, event: EngineEvent) {
        // No receiver means nobody is presenting; that's fine.
        let _ = self.events.send(event);
    }

    fn notify(&self, message: impl Into<String>) {
        self.emit(EngineEvent::Notification(message.into()));
    }

    /// Take the gate for a user operation.
    fn acquire_manual(&self, reject_when_automatic: bool) -> Result<BusyGuard<'_>> {
        let mut state = self.lock_state();
        if reject_when_automatic && state.enabled {
            return Err(Error::AutomationActive);
        }
        if state.busy {
            return Err(Error::Busy);
        }
        state.busy = true;
        Ok(BusyGuard { engine: self })
    }

    fn persist(&self, change: impl FnOnce(&mut crate::models::AppConfig)) {
        if let Some(store) = &self.store {
            if let Err(e) = store.modify_settings(change) {
                warn!("Failed to save settings: {}", e);
            }
        }
    }

    // ========================================================================
    // Automatic mode
    // ========================================================================

    /// Turn automatic switching on and evaluate immediately.
    pub fn enable(&self) {
        let mut state = self.lock_state();
        if state.enabled {
            return;
        }
        state.enabled = true;
        let busy = state.busy;
        if !busy {
            self.set_phase(&mut state, EnginePhase::Idle);
        }
        let period = state.poll_interval;
        state.scheduler = Some(self.start_loop(period));
        drop(state);

        // The loop's first tick is dropped while an earlier operation holds
        // the gate, so evaluate once it is released.
        if busy {
            if let Some(engine) = self.this.upgrade() {
                tokio::spawn(async move {
                    engine.wait_idle().await;
                    engine.run_cycle().await;
                });
            }
        }

        self.log.info(format!(
            "Automatic switching enabled (every {}s)",
            period.as_secs()
        ));
        self.persist(|s| s.automation_enabled = true);
    }

    /// Turn automatic switching off. An apply already running completes.
    pub fn disable(&self) {
        if self.stop_automation() {
            self.persist(|s| s.automation_enabled = false);
        }
    }

    /// Stop automatic switching for process exit. The saved setting is left
    /// alone so the next session resumes it.
    pub fn shutdown(&self) {
        self.stop_automation();
    }

    /// Returns false if automatic mode was already off.
    fn stop_automation(&self) -> bool {
        let mut state = self.lock_state();
        if !state.enabled {
            return false;
        }
        state.enabled = false;
        let scheduler = state.scheduler.take();
        if !state.busy {
            self.set_phase(&mut state, EnginePhase::Disabled);
        }
        let connected = state.connected_profile;
        drop(state);

        if let Some(scheduler) = scheduler {
            scheduler.stop();
        }
        match connected {
            Some(profile) => self.log.info(format!(
                "Automatic switching disabled, {} stays active",
                profile.name
            )),
            None => self.log.info("Automatic switching disabled"),
        }
        true
    }

    pub fn is_enabled(&self) -> bool {
        self.lock_state().enabled
    }

    fn start_loop(&self, period: Duration) -> SchedulerHandle {
        let this = self.this.clone();
        spawn_periodic(period, move || {
            let Some(engine) = this.upgrade() else {
                return;
            };
            // Detached so that stopping the loop never aborts an apply.
            tokio::spawn(async move {
                engine.run_cycle().await;
            });
        })
    }

    /// One automatic evaluation.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _guard = {
            let mut state = self.lock_state();
            if !state.enabled {
                return CycleOutcome::Disabled;
            }
            if state.busy {
                debug!("Tick dropped, another operation is in flight");
                return CycleOutcome::Busy;
            }
            state.busy = true;
            self.set_phase(&mut state, EnginePhase::Evaluating);
            BusyGuard { engine: self }
        };

        self.catalog.refresh_if_modified();
        let rules = self.catalog.rules();
        let watcher = self.watcher.clone();
        let scan = tokio::task::spawn_blocking(move || watcher.first_match(&rules));
        let matched = match scan.await {
            Ok(matched) => matched,
            Err(e) => {
                warn!("Process scan task failed: {}", e);
                None
            }
        };

        let (target, interfaces, current) = {
            let state = self.lock_state();
            if !state.enabled {
                debug!("Automatic switching disabled during scan, cycle abandoned");
                return CycleOutcome::Disabled;
            }
            let target = match &matched {
                Some(rule) => rule.profile,
                None => state.manual_profile.unwrap_or(DEFAULT_PROFILE),
            };
            (
                target,
                state.selection.selected_items(),
                state.last_signature.clone(),
            )
        };

        if interfaces.is_empty() {
            self.log.skip("No interface selected, nothing to switch");
            return CycleOutcome::NoInterfaces;
        }

        let reason = match &matched {
            Some(rule) => format!("{} is running", rule.path.display()),
            None => "no monitored program running".to_string(),
        };

        let signature = ApplySignature::new(&target, &interfaces);
        if current.as_ref() == Some(&signature) {
            if !(self.reassert_on_drift && self.has_drifted(&target, &interfaces).await) {
                debug!("{} already applied ({})", target.name, reason);
                return CycleOutcome::Unchanged(target);
            }
            self.log.info(format!(
                "Live DNS no longer matches {}, re-applying",
                target.name
            ));
        } else {
            self.log
                .info(format!("Switching to {} ({})", target.name, reason));
        }

        {
            let mut state = self.lock_state();
            if !state.enabled {
                debug!("Automatic switching disabled before apply, cycle abandoned");
                return CycleOutcome::Disabled;
            }
            self.set_phase(&mut state, EnginePhase::Applying);
        }

        let report = self
            .coordinator
            .apply(target, &interfaces, ApplyOrigin::Automation)
            .await;
        self.record(&report, signature);
        CycleOutcome::Applied(report)
    }

    /// Whether any interface reports resolvers other than `profile`'s.
    async fn has_drifted(&self, profile: &DnsProfile, interfaces: &[InterfaceItem]) -> bool {
        let Some(servers) = profile.servers() else {
            return false;
        };
        let backend = self.coordinator.backend();
        for interface in interfaces {
            match backend.query_current_dns(interface).await {
                Ok(live) => {
                    let expected = CurrentDns::from_addrs(
                        servers.ipv4().into_iter().chain(servers.ipv6()),
                    );
                    if !same_servers(&live, &expected) {
                        info!(
                            "{} drifted: IPv4 {} / IPv6 {}",
                            interface.name,
                            live.describe(IpFamily::V4),
                            live.describe(IpFamily::V6)
                        );
                        return true;
                    }
                }
                Err(e) => debug!("Drift check on {} failed: {}", interface.name, e),
            }
        }
        false
    }

    /// Store the outcome of an apply.
    ///
    /// A total failure leaves the previous signature in place so the next
    /// automatic tick retries.
    fn record(&self, report: &ApplyReport, signature: ApplySignature) {
        {
            let mut state = self.lock_state();
            if report.any_success() {
                state.last_signature = Some(signature);
                state.connected_profile = Some(report.profile);
            }
        }
        self.emit(EngineEvent::Applied(report.clone()));
    }

    // ========================================================================
    // Manual operations
    // ========================================================================

    /// Remember `name` as the manual selection without applying it.
    pub fn select_profile(&self, name: &str) -> Result<DnsProfile> {
        let profile = self.catalog.resolve(name)?;
        self.lock_state().manual_profile = Some(profile);
        self.log.info(format!("Selected profile {}", profile.name));
        self.persist(|s| s.last_manual_profile = Some(profile.name.to_string()));
        Ok(profile)
    }

    /// Apply a profile on behalf of the user.
    ///
    /// Returns `Ok(None)` when the same profile is already applied to the same
    /// interfaces and `force` is false.
    pub async fn apply_manual(&self, name: &str, force: bool) -> Result<Option<ApplyReport>> {
        let profile = self.catalog.resolve(name)?;
        let guard = match self.acquire_manual(true) {
            Ok(guard) => guard,
            Err(e) => {
                self.notify(format!("Cannot apply {}: {}", profile.name, e));
                return Err(e);
            }
        };

        let (interfaces, current) = {
            let mut state = self.lock_state();
            state.manual_profile = Some(profile);
            (state.selection.selected_items(), state.last_signature.clone())
        };
        self.persist(|s| s.last_manual_profile = Some(profile.name.to_string()));

        if interfaces.is_empty() {
            self.notify("Select at least one network interface");
            return Err(Error::NoInterfacesSelected);
        }

        let signature = ApplySignature::new(&profile, &interfaces);
        if !force && current.as_ref() == Some(&signature) {
            self.log
                .skip(format!("{} is already applied to {}", profile.name, signature));
            self.notify(format!("{} is already active", profile.name));
            return Ok(None);
        }

        {
            let mut state = self.lock_state();
            self.set_phase(&mut state, EnginePhase::Applying);
        }
        let report = self
            .coordinator
            .apply(profile, &interfaces, ApplyOrigin::User)
            .await;
        self.record(&report, signature);
        self.notify(report.message.clone());
        drop(guard);
        Ok(Some(report))
    }

    /// Flush the system resolver cache.
    pub async fn flush_resolver_cache(&self) -> Result<StepOutcome> {
        let _guard = self.acquire_manual(false)?;
        let outcome = self.coordinator.flush().await;
        if outcome.is_success() {
            self.notify("Resolver cache flushed");
            Ok(outcome)
        } else {
            self.notify("Resolver cache flush failed");
            Err(Error::backend("flush", "both methods failed"))
        }
    }

    /// Compare resolver latency across the static profiles.
    pub async fn probe_latency(&self) -> Result<ProbeReport> {
        let _guard = self.acquire_manual(false)?;
        self.log.info("Probing resolver latency");
        let probe = LatencyProbe::new(self.coordinator.backend().clone(), self.probe.clone());
        let report = probe.run().await;

        for domain in &report.domains {
            match domain.fastest() {
                Some(fastest) => self.log.push(
                    LogTag::Success,
                    format!(
                        "{}: fastest is {} ({} ms)",
                        domain.domain,
                        fastest.profile,
                        fastest.average.map(|d| d.as_millis()).unwrap_or_default()
                    ),
                ),
                None => self.log.push(
                    LogTag::Failed,
                    format!("{}: no resolver answered", domain.domain),
                ),
            }
        }
        self.notify("Latency probe finished");
        Ok(report)
    }

    /// Resolvers in effect on every selected interface.
    pub async fn show_current_dns(&self) -> Result<Vec<(InterfaceItem, Result<CurrentDns>)>> {
        let interfaces = self.lock_state().selection.selected_items();
        if interfaces.is_empty() {
            return Err(Error::NoInterfacesSelected);
        }

        let backend = self.coordinator.backend();
        let mut results = Vec::with_capacity(interfaces.len());
        for interface in interfaces {
            let result = backend.query_current_dns(&interface).await;
            match &result {
                Ok(dns) => self.log.info(format!(
                    "{}: IPv4 {} / IPv6 {}",
                    interface.name,
                    dns.describe(IpFamily::V4),
                    dns.describe(IpFamily::V6)
                )),
                Err(e) => self
                    .log
                    .push(LogTag::Failed, format!("{}: {}", interface.name, e)),
            }
            results.push((interface, result));
        }
        Ok(results)
    }

    // ========================================================================
    // Interfaces, settings, status
    // ========================================================================

    /// Rescan adapters, keeping the selection by id.
    pub async fn rescan_interfaces(&self) -> Result<Vec<(InterfaceItem, bool)>> {
        let items = self
            .coordinator
            .backend()
            .list_interfaces(self.include_advanced)
            .await?;
        let mut state = self.lock_state();
        state.selection.rescan(items);
        info!("Found {} interface(s)", state.selection.items().len());
        Ok(interface_rows(&state.selection))
    }

    pub fn interfaces(&self) -> Vec<(InterfaceItem, bool)> {
        interface_rows(&self.lock_state().selection)
    }

    pub fn set_interface_selected(&self, id_or_name: &str, selected: bool) -> Result<()> {
        let mut state = self.lock_state();
        let id = state
            .selection
            .items()
            .iter()
            .find(|i| i.id == id_or_name || i.name == id_or_name)
            .map(|i| i.id.clone())
            .ok_or_else(|| Error::InterfaceNotFound(id_or_name.to_string()))?;
        state.selection.set_selected(&id, selected);
        Ok(())
    }

    pub fn select_all(&self, selected: bool) {
        self.lock_state().selection.select_all(selected);
    }

    /// Change the poll interval, restarting the loop if it runs.
    pub fn set_poll_interval(&self, secs: u64) -> Duration {
        let secs = clamp_poll_interval(secs);
        let period = Duration::from_secs(secs);
        let old = {
            let mut state = self.lock_state();
            state.poll_interval = period;
            if state.enabled {
                let old = state.scheduler.take();
                state.scheduler = Some(self.start_loop(period));
                old
            } else {
                None
            }
        };
        if let Some(old) = old {
            old.stop();
        }
        self.log.info(format!("Poll interval set to {}s", secs));
        self.persist(|s| s.poll_interval_secs = secs);
        period
    }

    /// Profiles in display order.
    pub fn profiles(&self) -> &'static [DnsProfile] {
        self.catalog.profiles()
    }

    /// Current program rules in priority order.
    pub fn rules(&self) -> Arc<[ProgramRule]> {
        self.catalog.rules()
    }

    /// Force a rule reload. Returns the rule count.
    pub fn reload_rules(&self) -> usize {
        let count = self.catalog.reload_rules();
        self.log.info(format!("Loaded {} program rule(s)", count));
        count
    }

    pub fn status(&self) -> EngineStatus {
        let rule_count = self.catalog.rules().len();
        let state = self.lock_state();
        EngineStatus {
            phase: state.phase,
            enabled: state.enabled,
            busy: state.busy,
            manual_profile: state.manual_profile,
            connected_profile: state.connected_profile,
            last_signature: state.last_signature.clone(),
            interfaces: interface_rows(&state.selection),
            poll_interval: state.poll_interval,
            rule_count,
        }
    }

    pub fn activity_log(&self) -> &Arc<ActivityLog> {
        &self.log
    }

    /// Wait until no operation is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if !self.lock_state().busy {
                return;
            }
            notified.await;
        }
    }

    #[cfg(test)]
    fn set_enabled_flag(&self, enabled: bool) {
        let mut state = self.lock_state();
        state.enabled = enabled;
        state.phase = if enabled {
            EnginePhase::Idle
        } else {
            EnginePhase::Disabled
        };
    }
}

fn interface_rows(selection: &InterfaceSelection) -> Vec<(InterfaceItem, bool)> {
    selection
        .items()
        .iter()
        .map(|i| (i.clone(), selection.is_selected(&i.id)))
        .collect()
}

fn same_servers(live: &CurrentDns, expected: &CurrentDns) -> bool {
    let v4 = |d: &CurrentDns| d.ipv4.iter().copied().collect::<BTreeSet<_>>();
    let v6 = |d: &CurrentDns| d.ipv6.iter().copied().collect::<BTreeSet<_>>();
    v4(live) == v4(expected) && v6(live) == v6(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, Op};
    use crate::backend::Method;
    use crate::models::profile::{ADGUARD, CLOUDFLARE, GOOGLE, HINET};
    use crate::services::watcher::tests::FakeProcesses;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Holds the next scan until a value is sent.
    struct ScanHold {
        entered: Arc<Notify>,
        release: std::sync::mpsc::Receiver<()>,
    }

    /// Fake process list that counts scans.
    #[derive(Clone, Default)]
    struct CountingProcesses {
        inner: FakeProcesses,
        scans: Arc<AtomicUsize>,
        hold: Arc<std::sync::Mutex<Option<ScanHold>>>,
    }

    impl CountingProcesses {
        /// Block the next scan. Returns the "scan entered" signal and the
        /// sender that lets it continue.
        fn hold_next_scan(&self) -> (Arc<Notify>, std::sync::mpsc::Sender<()>) {
            let entered = Arc::new(Notify::new());
            let (tx, rx) = std::sync::mpsc::channel();
            *self.hold.lock().unwrap() = Some(ScanHold {
                entered: entered.clone(),
                release: rx,
            });
            (entered, tx)
        }
    }

    impl crate::services::watcher::ProcessSource for CountingProcesses {
        fn executable_paths(&self) -> Vec<PathBuf> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            let hold = self.hold.lock().unwrap().take();
            if let Some(hold) = hold {
                hold.entered.notify_one();
                let _ = hold.release.recv();
            }
            self.inner.executable_paths()
        }
    }

    struct Fixture {
        engine: Arc<SwitchEngine>,
        backend: Arc<MockBackend>,
        processes: CountingProcesses,
        _events: mpsc::UnboundedReceiver<EngineEvent>,
        _dir: TempDir,
    }

    async fn fixture(rules: &str, options: EngineOptions) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let rules_path = dir.path().join("programs.json");
        std::fs::write(&rules_path, rules).unwrap();

        let backend = Arc::new(MockBackend::new(vec![
            InterfaceItem::new("eth0", "AA:01", Some(2)),
            InterfaceItem::new("wifi0", "AA:02", Some(3)),
        ]));
        let log = Arc::new(ActivityLog::new(500));
        let processes = CountingProcesses::default();
        let (engine, events) = SwitchEngine::new(
            Arc::new(ProfileCatalog::new(rules_path)),
            ProcessWatcher::new(Box::new(processes.clone())),
            ApplyCoordinator::new(backend.clone(), log.clone()),
            log,
            None,
            options,
        );
        engine.rescan_interfaces().await.unwrap();
        backend.clear_calls();

        Fixture {
            engine,
            backend,
            processes,
            _events: events,
            _dir: dir,
        }
    }

    const RULES: &str = r#"{ "C:\\A\\x.exe": "Google", "C:\\B\\y.exe": "Cloudflare" }"#;

    fn applied_profile(outcome: CycleOutcome) -> Option<DnsProfile> {
        match outcome {
            CycleOutcome::Applied(report) => Some(report.profile),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_running_program_selects_its_profile() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);
        f.processes.inner.set(&["C:\\A\\x.exe", "C:\\B\\y.exe"]);

        assert_eq!(applied_profile(f.engine.run_cycle().await), Some(GOOGLE));
        assert_eq!(f.engine.status().connected_profile, Some(GOOGLE));
    }

    #[tokio::test]
    async fn test_no_match_falls_back_to_manual_then_default() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);
        assert_eq!(applied_profile(f.engine.run_cycle().await), Some(ADGUARD));

        f.engine.select_profile("hinet").unwrap();
        assert_eq!(applied_profile(f.engine.run_cycle().await), Some(HINET));
    }

    #[tokio::test]
    async fn test_second_cycle_issues_no_backend_calls() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);
        f.processes.inner.set(&["C:\\B\\y.exe"]);

        assert_eq!(applied_profile(f.engine.run_cycle().await), Some(CLOUDFLARE));
        f.backend.clear_calls();

        assert!(matches!(
            f.engine.run_cycle().await,
            CycleOutcome::Unchanged(p) if p == CLOUDFLARE
        ));
        assert!(f.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_is_retried() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);
        for name in ["eth0", "wifi0"] {
            f.backend.fail_both(name, Op::SetIpv4);
            f.backend.fail_both(name, Op::SetIpv6);
        }

        assert!(applied_profile(f.engine.run_cycle().await).is_some());
        assert!(f.engine.status().last_signature.is_none());

        f.backend.clear_calls();
        assert!(applied_profile(f.engine.run_cycle().await).is_some());
        assert!(f.backend.config_calls() > 0);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_signature() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);
        f.backend.fail_both("wifi0", Op::SetIpv6);

        f.engine.run_cycle().await;
        assert!(f.engine.status().last_signature.is_some());
        f.backend.clear_calls();
        assert!(matches!(f.engine.run_cycle().await, CycleOutcome::Unchanged(_)));
    }

    #[tokio::test]
    async fn test_drift_triggers_reapply() {
        let options = EngineOptions {
            reassert_on_drift: true,
            ..EngineOptions::default()
        };
        let f = fixture(RULES, options).await;
        f.engine.set_enabled_flag(true);
        f.engine.run_cycle().await;

        assert!(matches!(f.engine.run_cycle().await, CycleOutcome::Unchanged(_)));

        f.backend.set_live(
            "eth0",
            CurrentDns::from_addrs(["9.9.9.9".parse().unwrap()]),
        );
        assert_eq!(applied_profile(f.engine.run_cycle().await), Some(ADGUARD));
    }

    #[tokio::test]
    async fn test_manual_apply_rejected_while_automatic() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);

        let err = f.engine.apply_manual("Google", false).await.unwrap_err();
        assert!(matches!(err, Error::AutomationActive));
        assert!(f.backend.calls().is_empty());
        assert_eq!(f.engine.status().manual_profile, None);
    }

    #[tokio::test]
    async fn test_manual_apply_is_idempotent_unless_forced() {
        let f = fixture(RULES, EngineOptions::default()).await;

        let report = f.engine.apply_manual("Google", false).await.unwrap();
        assert!(report.is_some());
        f.backend.clear_calls();

        assert!(f.engine.apply_manual("google", false).await.unwrap().is_none());
        assert!(f.backend.calls().is_empty());

        assert!(f.engine.apply_manual("Google", true).await.unwrap().is_some());
        assert!(f.backend.config_calls() > 0);
    }

    #[tokio::test]
    async fn test_manual_apply_rejected_while_busy() {
        let f = fixture(RULES, EngineOptions::default()).await;
        let gate = f.backend.gate();

        let engine = f.engine.clone();
        let first = tokio::spawn(async move { engine.apply_manual("Google", false).await });
        gate.entered.notified().await;

        let before = f.engine.status();
        assert!(before.busy);
        let err = f.engine.apply_manual("Cloudflare", false).await.unwrap_err();
        assert!(matches!(err, Error::Busy));
        assert!(matches!(f.engine.flush_resolver_cache().await, Err(Error::Busy)));

        let after = f.engine.status();
        assert_eq!(after.manual_profile, before.manual_profile);
        assert_eq!(after.last_signature, before.last_signature);
        assert_eq!(after.phase, before.phase);

        gate.release.notify_one();
        let report = first.await.unwrap().unwrap().unwrap();
        assert_eq!(report.profile, GOOGLE);
        assert!(!f.engine.status().busy);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_lets_inflight_apply_finish() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.select_all(false);
        f.engine.set_interface_selected("eth0", true).unwrap();
        let gate = f.backend.gate();

        f.engine.enable();
        gate.entered.notified().await;
        f.engine.disable();
        assert!(f.engine.status().busy);

        gate.release.notify_one();
        f.engine.wait_idle().await;

        let status = f.engine.status();
        assert_eq!(status.phase, EnginePhase::Disabled);
        assert_eq!(status.connected_profile, Some(ADGUARD));
        // EnableIpv6, SetIpv4, SetIpv6 on eth0.
        assert_eq!(f.backend.config_calls(), 3);

        let scans = f.processes.scans.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(f.processes.scans.load(Ordering::SeqCst), scans);
        assert_eq!(f.backend.config_calls(), 3);
    }

    #[tokio::test]
    async fn test_disable_during_scan_abandons_cycle() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_enabled_flag(true);
        f.processes.inner.set(&["C:\\A\\x.exe"]);
        let (entered, release) = f.processes.hold_next_scan();

        let engine = f.engine.clone();
        let cycle = tokio::spawn(async move { engine.run_cycle().await });
        entered.notified().await;
        assert_eq!(f.engine.status().phase, EnginePhase::Evaluating);

        f.engine.disable();
        release.send(()).unwrap();

        assert!(matches!(cycle.await.unwrap(), CycleOutcome::Disabled));
        assert_eq!(f.backend.config_calls(), 0);
        let status = f.engine.status();
        assert!(!status.busy);
        assert_eq!(status.phase, EnginePhase::Disabled);
        assert_eq!(status.connected_profile, None);
        assert!(status.last_signature.is_none());
    }

    #[tokio::test]
    async fn test_tick_dropped_while_manual_apply_in_flight() {
        let f = fixture(RULES, EngineOptions::default()).await;
        let gate = f.backend.gate();

        let engine = f.engine.clone();
        let manual = tokio::spawn(async move { engine.apply_manual("Google", false).await });
        gate.entered.notified().await;

        f.engine.set_enabled_flag(true);
        let calls = f.backend.calls().len();
        assert!(matches!(f.engine.run_cycle().await, CycleOutcome::Busy));
        assert_eq!(f.backend.calls().len(), calls);
        assert_eq!(f.processes.scans.load(Ordering::SeqCst), 0);

        f.engine.set_enabled_flag(false);
        gate.release.notify_one();
        manual.await.unwrap().unwrap();
        f.engine.wait_idle().await;

        // The dropped tick is not replayed.
        assert_eq!(f.processes.scans.load(Ordering::SeqCst), 0);
        assert_eq!(f.engine.status().connected_profile, Some(GOOGLE));
    }

    #[tokio::test]
    async fn test_latency_probe_excluded_during_apply() {
        let f = fixture(RULES, EngineOptions::default()).await;
        let gate = f.backend.gate();

        let engine = f.engine.clone();
        let manual = tokio::spawn(async move { engine.apply_manual("Cloudflare", false).await });
        gate.entered.notified().await;

        assert!(matches!(f.engine.probe_latency().await, Err(Error::Busy)));
        assert!(f.backend.calls_for(Op::Latency).is_empty());

        gate.release.notify_one();
        manual.await.unwrap().unwrap();
        assert!(f.engine.probe_latency().await.is_ok());
        assert!(!f.backend.calls_for(Op::Latency).is_empty());
    }

    #[tokio::test]
    async fn test_reenable_evaluates_after_inflight_apply() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.select_all(false);
        f.engine.set_interface_selected("eth0", true).unwrap();
        let gate = f.backend.gate();

        f.engine.enable();
        gate.entered.notified().await;
        f.engine.disable();
        f.engine.select_profile("Google").unwrap();
        f.engine.enable();
        gate.release.notify_one();

        // Well inside the 5s poll period.
        let reached = tokio::time::timeout(Duration::from_secs(2), async {
            while f.engine.status().connected_profile != Some(GOOGLE) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        f.engine.disable();
        assert!(reached.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enable_evaluates_immediately() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.enable();
        tokio::time::sleep(Duration::from_millis(10)).await;
        f.engine.wait_idle().await;

        assert_eq!(f.engine.status().connected_profile, Some(ADGUARD));
        assert!(f.processes.scans.load(Ordering::SeqCst) >= 1);
        f.engine.disable();
    }

    #[tokio::test]
    async fn test_no_selected_interfaces() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.select_all(false);
        f.engine.set_enabled_flag(true);
        assert!(matches!(f.engine.run_cycle().await, CycleOutcome::NoInterfaces));

        f.engine.set_enabled_flag(false);
        assert!(matches!(
            f.engine.apply_manual("Google", false).await,
            Err(Error::NoInterfacesSelected)
        ));
        assert!(matches!(f.engine.run_cycle().await, CycleOutcome::Disabled));
    }

    #[tokio::test]
    async fn test_selection_survives_rescan() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.engine.set_interface_selected("wifi0", false).unwrap();
        assert!(f.engine.set_interface_selected("eth9", true).is_err());

        f.backend.set_interfaces(vec![
            InterfaceItem::new("eth0", "AA:01", Some(2)),
            InterfaceItem::new("wifi0-renamed", "AA:02", Some(3)),
            InterfaceItem::new("eth1", "AA:03", Some(4)),
        ]);
        let rows = f.engine.rescan_interfaces().await.unwrap();
        let selected: Vec<_> = rows
            .iter()
            .filter(|(_, on)| *on)
            .map(|(i, _)| i.name.as_str())
            .collect();
        assert_eq!(selected, vec!["eth0", "eth1"]);
    }

    #[tokio::test]
    async fn test_flush_falls_back() {
        let f = fixture(RULES, EngineOptions::default()).await;
        f.backend.fail("", Op::Flush, Method::Primary);
        assert_eq!(
            f.engine.flush_resolver_cache().await.unwrap(),
            StepOutcome::FallbackUsed
        );

        f.backend.fail("", Op::Flush, Method::Fallback);
        assert!(f.engine.flush_resolver_cache().await.is_err());
    }

    #[tokio::test]
    async fn test_poll_interval_clamped() {
        let f = fixture(RULES, EngineOptions::default()).await;
        assert_eq!(f.engine.set_poll_interval(1), Duration::from_secs(3));
        assert_eq!(f.engine.status().poll_interval, Duration::from_secs(3));
    }
}
