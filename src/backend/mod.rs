// AutoDNS - Network Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! OS-level network configuration capability.
//!
//! The switching engine never talks to the operating system directly. It
//! drives a [`NetworkBackend`], which exposes each configuration primitive
//! through two methods: a primary one and an independent fallback. The
//! caller decides when to fall back; the backend only reports success or
//! failure of the method it was asked to use.

use async_trait::async_trait;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::models::{InterfaceItem, Result};

pub mod resolved;

#[cfg(test)]
pub mod mock;

pub use resolved::ResolvedBackend;

/// Which of the two documented methods to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Primary,
    Fallback,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

/// Address family of a resolver list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V4 => "IPv4",
            Self::V6 => "IPv6",
        }
    }
}

/// Resolvers currently configured on an interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurrentDns {
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
}

impl CurrentDns {
    pub fn from_addrs(addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut dns = Self::default();
        for addr in addrs {
            match addr {
                IpAddr::V4(v4) => dns.ipv4.push(v4),
                IpAddr::V6(v6) => dns.ipv6.push(v6),
            }
        }
        dns
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// "a, b" list for one family, "(none)" when empty.
    pub fn describe(&self, family: IpFamily) -> String {
        let list: Vec<String> = match family {
            IpFamily::V4 => self.ipv4.iter().map(ToString::to_string).collect(),
            IpFamily::V6 => self.ipv6.iter().map(ToString::to_string).collect(),
        };
        if list.is_empty() {
            "(none)".to_string()
        } else {
            list.join(", ")
        }
    }
}

/// Network configuration primitives consumed by the engine.
#[async_trait]
pub trait NetworkBackend: Send + Sync {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Operational Ethernet/Wi-Fi interfaces (plus PPP/other when
    /// `include_advanced`), in a stable order.
    async fn list_interfaces(&self, include_advanced: bool) -> Result<Vec<InterfaceItem>>;

    /// Replace the resolver list of one address family.
    async fn set_servers(
        &self,
        interface: &InterfaceItem,
        family: IpFamily,
        servers: &[IpAddr],
        method: Method,
    ) -> Result<()>;

    /// Return both families to automatically assigned resolvers.
    async fn reset_to_dhcp(&self, interface: &InterfaceItem, method: Method) -> Result<()>;

    /// Make sure IPv6 is bound on the interface. Returns true if it had to
    /// be enabled.
    async fn ensure_ipv6_enabled(&self, interface: &InterfaceItem) -> Result<bool>;

    /// Resolvers currently in effect on the interface.
    async fn query_current_dns(&self, interface: &InterfaceItem) -> Result<CurrentDns>;

    /// Drop cached resolver answers system-wide.
    async fn flush_resolver_cache(&self, method: Method) -> Result<()>;

    /// Average time to resolve `domain` through `resolver` over `samples`
    /// uncached lookups.
    async fn measure_resolution_latency(
        &self,
        resolver: IpAddr,
        domain: &str,
        samples: u32,
    ) -> Result<Duration>;
}
