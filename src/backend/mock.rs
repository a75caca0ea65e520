// AutoDNS - Mock Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Recording backend for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use super::{CurrentDns, IpFamily, Method, NetworkBackend};
use crate::models::{Error, InterfaceItem, Result};

/// Backend operation, as recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListInterfaces,
    SetIpv4,
    SetIpv6,
    ResetToDhcp,
    EnableIpv6,
    QueryDns,
    Flush,
    Latency,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    /// Interface name, empty for system-wide operations.
    pub interface: String,
    pub method: Method,
}

/// Holds the first configuration call until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct MockBackend {
    interfaces: Mutex<Vec<InterfaceItem>>,
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashSet<(String, Op, Method)>>,
    latencies: Mutex<HashMap<IpAddr, Duration>>,
    live: Mutex<HashMap<String, CurrentDns>>,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl MockBackend {
    pub fn new(interfaces: Vec<InterfaceItem>) -> Self {
        Self {
            interfaces: Mutex::new(interfaces),
            ..Self::default()
        }
    }

    /// Make `op` fail on `interface` (empty for system-wide) with `method`.
    pub fn fail(&self, interface: &str, op: Op, method: Method) {
        self.failures
            .lock()
            .unwrap()
            .insert((interface.to_string(), op, method));
    }

    /// Make `op` fail with both methods.
    pub fn fail_both(&self, interface: &str, op: Op) {
        self.fail(interface, op, Method::Primary);
        self.fail(interface, op, Method::Fallback);
    }

    pub fn set_latency(&self, resolver: IpAddr, latency: Duration) {
        self.latencies.lock().unwrap().insert(resolver, latency);
    }

    pub fn set_interfaces(&self, interfaces: Vec<InterfaceItem>) {
        *self.interfaces.lock().unwrap() = interfaces;
    }

    /// Overwrite what the interface reports, as if changed externally.
    pub fn set_live(&self, interface: &str, dns: CurrentDns) {
        self.live.lock().unwrap().insert(interface.to_string(), dns);
    }

    /// Install a gate and return it.
    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, op: Op) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op == op).collect()
    }

    /// Calls that change interface configuration.
    pub fn config_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| {
                matches!(
                    c.op,
                    Op::SetIpv4 | Op::SetIpv6 | Op::ResetToDhcp | Op::EnableIpv6
                )
            })
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    async fn record(&self, op: Op, interface: &str, method: Method) -> Result<()> {
        self.calls.lock().unwrap().push(Call {
            op,
            interface: interface.to_string(),
            method,
        });

        if matches!(op, Op::SetIpv4 | Op::SetIpv6 | Op::ResetToDhcp) {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        let failing = self
            .failures
            .lock()
            .unwrap()
            .contains(&(interface.to_string(), op, method));
        if failing {
            Err(Error::backend(
                format!("{:?}", op),
                format!("{} {} failed", interface, method.as_str()),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NetworkBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn list_interfaces(&self, _include_advanced: bool) -> Result<Vec<InterfaceItem>> {
        self.record(Op::ListInterfaces, "", Method::Primary).await?;
        Ok(self.interfaces.lock().unwrap().clone())
    }

    async fn set_servers(
        &self,
        interface: &InterfaceItem,
        family: IpFamily,
        servers: &[IpAddr],
        method: Method,
    ) -> Result<()> {
        let op = match family {
            IpFamily::V4 => Op::SetIpv4,
            IpFamily::V6 => Op::SetIpv6,
        };
        self.record(op, &interface.name, method).await?;

        let mut live = self.live.lock().unwrap();
        let entry = live.entry(interface.name.clone()).or_default();
        let parsed = CurrentDns::from_addrs(servers.iter().copied());
        match family {
            IpFamily::V4 => entry.ipv4 = parsed.ipv4,
            IpFamily::V6 => entry.ipv6 = parsed.ipv6,
        }
        Ok(())
    }

    async fn reset_to_dhcp(&self, interface: &InterfaceItem, method: Method) -> Result<()> {
        self.record(Op::ResetToDhcp, &interface.name, method).await?;
        self.live.lock().unwrap().remove(&interface.name);
        Ok(())
    }

    async fn ensure_ipv6_enabled(&self, interface: &InterfaceItem) -> Result<bool> {
        self.record(Op::EnableIpv6, &interface.name, Method::Primary)
            .await?;
        Ok(false)
    }

    async fn query_current_dns(&self, interface: &InterfaceItem) -> Result<CurrentDns> {
        self.record(Op::QueryDns, &interface.name, Method::Primary)
            .await?;
        Ok(self
            .live
            .lock()
            .unwrap()
            .get(&interface.name)
            .cloned()
            .unwrap_or_default())
    }

    async fn flush_resolver_cache(&self, method: Method) -> Result<()> {
        self.record(Op::Flush, "", method).await
    }

    async fn measure_resolution_latency(
        &self,
        resolver: IpAddr,
        domain: &str,
        _samples: u32,
    ) -> Result<Duration> {
        self.record(Op::Latency, "", Method::Primary).await?;
        self.latencies
            .lock()
            .unwrap()
            .get(&resolver)
            .copied()
            .ok_or_else(|| {
                Error::ProbeFailed(format!("{} did not answer for {}", resolver, domain))
            })
    }
}
