// AutoDNS - DNS Profile Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! DNS profile definitions.
//!
//! A profile is a named resolver configuration: either a fixed pair of IPv4
//! and IPv6 resolvers, or the DHCP pseudo-profile that hands the interface
//! back to whatever the network advertises. The set is fixed for the
//! lifetime of the process.

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Static resolver addresses of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StaticServers {
    pub ipv4_primary: Ipv4Addr,
    pub ipv4_secondary: Ipv4Addr,
    pub ipv6_primary: Ipv6Addr,
    pub ipv6_secondary: Ipv6Addr,
}

impl StaticServers {
    /// IPv4 server list in priority order.
    pub fn ipv4(&self) -> [IpAddr; 2] {
        [IpAddr::V4(self.ipv4_primary), IpAddr::V4(self.ipv4_secondary)]
    }

    /// IPv6 server list in priority order.
    pub fn ipv6(&self) -> [IpAddr; 2] {
        [IpAddr::V6(self.ipv6_primary), IpAddr::V6(self.ipv6_secondary)]
    }
}

/// How a profile configures an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProfileKind {
    /// Fixed resolver addresses.
    Static(StaticServers),
    /// Reset to automatically assigned resolvers.
    Dhcp,
}

/// A named DNS configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DnsProfile {
    pub name: &'static str,
    pub kind: ProfileKind,
}

impl DnsProfile {
    const fn fixed(
        name: &'static str,
        ipv4_primary: Ipv4Addr,
        ipv4_secondary: Ipv4Addr,
        ipv6_primary: Ipv6Addr,
        ipv6_secondary: Ipv6Addr,
    ) -> Self {
        Self {
            name,
            kind: ProfileKind::Static(StaticServers {
                ipv4_primary,
                ipv4_secondary,
                ipv6_primary,
                ipv6_secondary,
            }),
        }
    }

    /// Whether this is the DHCP pseudo-profile.
    pub fn is_dhcp(&self) -> bool {
        matches!(self.kind, ProfileKind::Dhcp)
    }

    /// Static servers, `None` for DHCP.
    pub fn servers(&self) -> Option<&StaticServers> {
        match &self.kind {
            ProfileKind::Static(servers) => Some(servers),
            ProfileKind::Dhcp => None,
        }
    }

    /// Resolver used when probing this profile.
    pub fn probe_resolver(&self) -> Option<IpAddr> {
        self.servers().map(|s| IpAddr::V4(s.ipv4_primary))
    }
}

impl fmt::Display for DnsProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

pub const ADGUARD: DnsProfile = DnsProfile::fixed(
    "AdGuard",
    Ipv4Addr::new(94, 140, 14, 14),
    Ipv4Addr::new(94, 140, 15, 15),
    Ipv6Addr::new(0x2a10, 0x50c0, 0, 0, 0, 0, 0xad1, 0xff),
    Ipv6Addr::new(0x2a10, 0x50c0, 0, 0, 0, 0, 0xad2, 0xff),
);

pub const HINET: DnsProfile = DnsProfile::fixed(
    "HiNet",
    Ipv4Addr::new(168, 95, 1, 1),
    Ipv4Addr::new(168, 95, 192, 1),
    Ipv6Addr::new(0x2001, 0xb000, 0x168, 0, 0, 0, 0, 0x1),
    Ipv6Addr::new(0x2001, 0xb000, 0x168, 0, 0, 0, 0, 0x2),
);

pub const CLOUDFLARE: DnsProfile = DnsProfile::fixed(
    "Cloudflare",
    Ipv4Addr::new(1, 1, 1, 1),
    Ipv4Addr::new(1, 0, 0, 1),
    Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111),
    Ipv6Addr::new(0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1001),
);

pub const GOOGLE: DnsProfile = DnsProfile::fixed(
    "Google",
    Ipv4Addr::new(8, 8, 8, 8),
    Ipv4Addr::new(8, 8, 4, 4),
    Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888),
    Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8844),
);

pub const DHCP: DnsProfile = DnsProfile {
    name: "Dhcp",
    kind: ProfileKind::Dhcp,
};

/// All known profiles, static ones first.
pub const ALL_PROFILES: [DnsProfile; 5] = [ADGUARD, HINET, CLOUDFLARE, GOOGLE, DHCP];

/// Target when automation finds no match and nothing was ever selected.
pub const DEFAULT_PROFILE: DnsProfile = ADGUARD;

/// Look up a profile by name, ignoring ASCII case.
pub fn lookup(name: &str) -> Option<DnsProfile> {
    let name = name.trim();
    ALL_PROFILES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .copied()
}
