// AutoDNS - systemd-resolved Backend
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! systemd-resolved backend.
//!
//! Primary methods talk to `org.freedesktop.resolve1` over the system bus and
//! need the interface index. Fallback methods run `resolvectl`, which accepts
//! interface names, so they also cover adapters without a usable index.

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use regex::Regex;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use zbus::Connection;

use super::{CurrentDns, IpFamily, Method, NetworkBackend};
use crate::models::{Error, InterfaceItem, Result};
use crate::network_utils;

const RESOLVE1_SERVICE: &str = "org.freedesktop.resolve1";
const RESOLVE1_PATH: &str = "/org/freedesktop/resolve1";
const RESOLVE1_MANAGER: &str = "org.freedesktop.resolve1.Manager";

const RESOLVECTL: &str = "resolvectl";

const AF_INET: i32 = 2;
const AF_INET6: i32 = 10;

/// Per-lookup timeout while probing.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Resolvers last written to a link, per family.
///
/// resolved keeps a single list per link, so writing one family has to
/// resend the other.
#[derive(Debug, Clone, Default)]
struct LinkServers {
    ipv4: Vec<IpAddr>,
    ipv6: Vec<IpAddr>,
}

impl LinkServers {
    fn with(&self, family: IpFamily, servers: &[IpAddr]) -> Self {
        let mut next = self.clone();
        match family {
            IpFamily::V4 => next.ipv4 = servers.to_vec(),
            IpFamily::V6 => next.ipv6 = servers.to_vec(),
        }
        next
    }

    fn combined(&self) -> Vec<IpAddr> {
        self.ipv4.iter().chain(self.ipv6.iter()).copied().collect()
    }
}

/// Backend for hosts running systemd-resolved.
pub struct ResolvedBackend {
    connection: OnceCell<Connection>,
    links: Mutex<HashMap<String, LinkServers>>,
}

impl ResolvedBackend {
    pub fn new() -> Self {
        Self {
            connection: OnceCell::new(),
            links: Mutex::new(HashMap::new()),
        }
    }

    /// Connect to the system bus on first use.
    async fn connection(&self) -> Result<&Connection> {
        self.connection
            .get_or_try_init(|| async {
                let conn = Connection::system().await?;
                debug!("Connected to system D-Bus");
                Ok::<_, Error>(conn)
            })
            .await
    }

    async fn call_manager<B>(&self, method: &str, body: &B) -> Result<()>
    where
        B: serde::Serialize + zbus::zvariant::DynamicType + Sync,
    {
        let conn = self.connection().await?;
        debug!("D-Bus {}.{}", RESOLVE1_MANAGER, method);
        conn.call_method(
            Some(RESOLVE1_SERVICE),
            RESOLVE1_PATH,
            Some(RESOLVE1_MANAGER),
            method,
            body,
        )
        .await?;
        Ok(())
    }

    fn link_servers(&self, name: &str) -> LinkServers {
        match self.links.lock() {
            Ok(links) => links.get(name).cloned().unwrap_or_default(),
            Err(poisoned) => poisoned.into_inner().get(name).cloned().unwrap_or_default(),
        }
    }

    fn remember(&self, name: &str, servers: Option<LinkServers>) {
        let mut links = match self.links.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Link cache lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        match servers {
            Some(servers) => {
                links.insert(name.to_string(), servers);
            }
            None => {
                links.remove(name);
            }
        }
    }

    fn require_index(interface: &InterfaceItem) -> Result<i32> {
        interface
            .index
            .and_then(|i| i32::try_from(i).ok())
            .ok_or_else(|| Error::InterfaceUnaddressable(interface.name.clone()))
    }
}

impl Default for ResolvedBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode addresses the way `SetLinkDNS` expects them: `a(iay)`.
fn encode_addresses(servers: &[IpAddr]) -> Vec<(i32, Vec<u8>)> {
    servers
        .iter()
        .map(|addr| match addr {
            IpAddr::V4(v4) => (AF_INET, v4.octets().to_vec()),
            IpAddr::V6(v6) => (AF_INET6, v6.octets().to_vec()),
        })
        .collect()
}

/// Run a command, returning stdout on a zero exit status.
async fn run_command(program: &str, args: &[String]) -> Result<String> {
    let rendered = format!("{} {}", program, args.join(" "));
    debug!("Running: {}", rendered);

    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::command_failed(&rendered, e.to_string()))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() {
            format!("exit status {}", output.status)
        } else {
            stderr
        };
        Err(Error::command_failed(rendered, reason))
    }
}

fn link_line_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^Link\s+\d+\s+\(([^)]+)\):\s*(.*)$").ok())
        .as_ref()
}

/// Parse `resolvectl dns <link>` output for one interface.
fn parse_resolvectl_dns(output: &str, interface: &str) -> CurrentDns {
    let Some(re) = link_line_regex() else {
        return CurrentDns::default();
    };
    output
        .lines()
        .filter_map(|line| re.captures(line.trim()))
        .filter(|caps| &caps[1] == interface)
        .map(|caps| {
            CurrentDns::from_addrs(
                caps[2]
                    .split_whitespace()
                    // Entries may carry a port or SNI suffix: 1.1.1.1#cloudflare-dns.com
                    .filter_map(|tok| tok.split('#').next()?.parse::<IpAddr>().ok()),
            )
        })
        .next()
        .unwrap_or_default()
}

#[async_trait]
impl NetworkBackend for ResolvedBackend {
    fn name(&self) -> &'static str {
        "systemd-resolved"
    }

    async fn list_interfaces(&self, include_advanced: bool) -> Result<Vec<InterfaceItem>> {
        tokio::task::spawn_blocking(move || network_utils::detect_interfaces(include_advanced))
            .await
            .map_err(|e| Error::Internal(format!("interface scan task failed: {}", e)))
    }

    async fn set_servers(
        &self,
        interface: &InterfaceItem,
        family: IpFamily,
        servers: &[IpAddr],
        method: Method,
    ) -> Result<()> {
        let next = self.link_servers(&interface.name).with(family, servers);
        let combined = next.combined();

        match method {
            Method::Primary => {
                let index = Self::require_index(interface)?;
                self.call_manager("SetLinkDNS", &(index, encode_addresses(&combined)))
                    .await?;
            }
            Method::Fallback => {
                let mut args = vec!["dns".to_string(), interface.name.clone()];
                args.extend(combined.iter().map(ToString::to_string));
                run_command(RESOLVECTL, &args).await?;
            }
        }

        self.remember(&interface.name, Some(next));
        Ok(())
    }

    async fn reset_to_dhcp(&self, interface: &InterfaceItem, method: Method) -> Result<()> {
        match method {
            Method::Primary => {
                let index = Self::require_index(interface)?;
                self.call_manager("RevertLink", &(index,)).await?;
            }
            Method::Fallback => {
                run_command(RESOLVECTL, &["revert".to_string(), interface.name.clone()]).await?;
            }
        }
        self.remember(&interface.name, None);
        Ok(())
    }

    async fn ensure_ipv6_enabled(&self, interface: &InterfaceItem) -> Result<bool> {
        let path = format!("/proc/sys/net/ipv6/conf/{}/disable_ipv6", interface.name);
        let current = tokio::fs::read_to_string(&path).await?;
        if current.trim() == "0" {
            return Ok(false);
        }
        tokio::fs::write(&path, "0\n").await?;
        Ok(true)
    }

    async fn query_current_dns(&self, interface: &InterfaceItem) -> Result<CurrentDns> {
        let output = run_command(RESOLVECTL, &["dns".to_string(), interface.name.clone()]).await?;
        Ok(parse_resolvectl_dns(&output, &interface.name))
    }

    async fn flush_resolver_cache(&self, method: Method) -> Result<()> {
        match method {
            Method::Primary => self.call_manager("FlushCaches", &()).await,
            Method::Fallback => run_command(RESOLVECTL, &["flush-caches".to_string()])
                .await
                .map(|_| ()),
        }
    }

    async fn measure_resolution_latency(
        &self,
        resolver: IpAddr,
        domain: &str,
        samples: u32,
    ) -> Result<Duration> {
        let mut config = ResolverConfig::new();
        config.add_name_server(NameServerConfig::new(
            SocketAddr::new(resolver, 53),
            Protocol::Udp,
        ));

        let mut opts = ResolverOpts::default();
        opts.cache_size = 0;
        opts.attempts = 1;
        opts.timeout = PROBE_TIMEOUT;

        let lookup = TokioAsyncResolver::tokio(config, opts);

        let mut total = Duration::ZERO;
        let mut answered = 0u32;
        for _ in 0..samples.max(1) {
            let started = Instant::now();
            match lookup.lookup_ip(domain).await {
                Ok(_) => {
                    total += started.elapsed();
                    answered += 1;
                }
                Err(e) => debug!("Lookup of {} via {} failed: {}", domain, resolver, e),
            }
        }

        if answered == 0 {
            return Err(Error::ProbeFailed(format!(
                "{} did not answer for {}",
                resolver, domain
            )));
        }
        Ok(total / answered)
    }
}
