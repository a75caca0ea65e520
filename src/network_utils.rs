// AutoDNS - Network Utilities
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Network interface detection.
//!
//! Interfaces are read from the Linux sysfs tree. Only operational adapters
//! of a selectable type are returned.

use std::fs;
use std::path::Path;

use crate::models::{AdapterType, InterfaceItem};

const SYSFS_NET: &str = "/sys/class/net";

/// ARPHRD_ETHER.
const ARPHRD_ETHER: u32 = 1;
/// ARPHRD_PPP.
const ARPHRD_PPP: u32 = 512;
/// ARPHRD_LOOPBACK.
const ARPHRD_LOOPBACK: u32 = 772;
/// NET_ADDR_PERM: the address is the burned-in hardware address.
const NET_ADDR_PERM: &str = "0";

/// Detect selectable network interfaces on the system.
pub fn detect_interfaces(include_advanced: bool) -> Vec<InterfaceItem> {
    detect_interfaces_in(Path::new(SYSFS_NET), include_advanced)
}

/// Detect interfaces below a sysfs-style `net` directory.
pub fn detect_interfaces_in(net_path: &Path, include_advanced: bool) -> Vec<InterfaceItem> {
    let mut interfaces = Vec::new();

    let Ok(entries) = fs::read_dir(net_path) else {
        return interfaces;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name == "lo" {
            continue;
        }

        let path = entry.path();
        let adapter_type = determine_adapter_type(&path, &name);
        if !adapter_type.is_selectable(include_advanced) || !is_operational(&path) {
            continue;
        }

        let index = read_trimmed(&path.join("ifindex")).and_then(|s| s.parse::<u32>().ok());

        let id = stable_id(&path, &name);
        let mut item = InterfaceItem::new(&name, id, index);
        item.adapter_type = adapter_type;
        interfaces.push(item);
    }

    // Sort by name for consistent ordering
    interfaces.sort_by(|a, b| natural_sort_key(&a.name).cmp(&natural_sort_key(&b.name)));
    interfaces
}

/// Permanent MAC address, or the interface name when the current address is
/// random, stolen or set by userspace.
fn stable_id(path: &Path, name: &str) -> String {
    if read_trimmed(&path.join("addr_assign_type")).as_deref() != Some(NET_ADDR_PERM) {
        return name.to_string();
    }
    read_trimmed(&path.join("address"))
        .map(|mac| mac.to_uppercase())
        .filter(|mac| !mac.is_empty() && mac != "00:00:00:00:00:00")
        .unwrap_or_else(|| name.to_string())
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Up, or "unknown" with a carrier (typical for PPP links).
fn is_operational(path: &Path) -> bool {
    match read_trimmed(&path.join("operstate")).as_deref() {
        Some("up") => true,
        Some("unknown") => read_trimmed(&path.join("carrier")).as_deref() == Some("1"),
        _ => false,
    }
}

/// Determine the type of network adapter.
fn determine_adapter_type(path: &Path, name: &str) -> AdapterType {
    // Wireless devices expose a wireless/ directory or DEVTYPE=wlan
    if path.join("wireless").exists() {
        return AdapterType::Wifi;
    }
    if let Some(uevent) = read_trimmed(&path.join("uevent")) {
        if uevent.contains("DEVTYPE=wlan") {
            return AdapterType::Wifi;
        }
    }

    if let Some(type_num) = read_trimmed(&path.join("type")).and_then(|s| s.parse::<u32>().ok()) {
        match type_num {
            ARPHRD_ETHER => {
                if is_virtual_interface(name) {
                    return AdapterType::Virtual;
                }
                return AdapterType::Ethernet;
            }
            ARPHRD_PPP => return AdapterType::Ppp,
            ARPHRD_LOOPBACK => return AdapterType::Loopback,
            _ => {}
        }
    }

    if name.starts_with("wl") || name.starts_with("wifi") {
        return AdapterType::Wifi;
    }
    if name.starts_with("ppp") {
        return AdapterType::Ppp;
    }
    if is_virtual_interface(name) {
        return AdapterType::Virtual;
    }
    if name.starts_with("en") || name.starts_with("eth") {
        return AdapterType::Ethernet;
    }

    AdapterType::Other
}

/// Check if interface name suggests a virtual/tunnel interface.
fn is_virtual_interface(name: &str) -> bool {
    const PREFIXES: [&str; 12] = [
        "veth", "br", "virbr", "docker", "vnet", "tun", "tap", "bond", "team", "vlan", "wg",
        "tailscale",
    ];
    PREFIXES.iter().any(|p| name.starts_with(p)) || name.contains("podman")
}

/// Generate a sort key that sorts numbers naturally.
fn natural_sort_key(s: &str) -> (String, u32) {
    let prefix: String = s.chars().filter(|c| !c.is_ascii_digit()).collect();
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    (prefix, digits.parse().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fake_iface(root: &Path, name: &str, files: &[(&str, &str)]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for (file, content) in files {
            fs::write(dir.join(file), content).unwrap();
        }
    }

    #[test]
    fn test_natural_sort_key() {
        assert_eq!(natural_sort_key("eth0"), ("eth".to_string(), 0));
        assert_eq!(natural_sort_key("eth10"), ("eth".to_string(), 10));
        assert!(natural_sort_key("eth2") < natural_sort_key("eth10"));
    }

    #[test]
    fn test_detects_operational_physical_interfaces() {
        let root = tempdir().unwrap();
        let net = root.path();
        fake_iface(
            net,
            "eth0",
            &[
                ("type", "1\n"),
                ("operstate", "up\n"),
                ("ifindex", "2\n"),
                ("addr_assign_type", "0\n"),
                ("address", "aa:bb:cc:dd:ee:01\n"),
            ],
        );
        fake_iface(
            net,
            "wlan0",
            &[
                ("type", "1\n"),
                ("operstate", "up\n"),
                ("ifindex", "3\n"),
                ("uevent", "DEVTYPE=wlan\n"),
            ],
        );
        fake_iface(
            net,
            "eth1",
            &[("type", "1\n"), ("operstate", "down\n"), ("ifindex", "4\n")],
        );
        fake_iface(
            net,
            "docker0",
            &[("type", "1\n"), ("operstate", "up\n"), ("ifindex", "5\n")],
        );
        fake_iface(
            net,
            "ppp0",
            &[
                ("type", "512\n"),
                ("operstate", "unknown\n"),
                ("carrier", "1\n"),
                ("ifindex", "6\n"),
            ],
        );
        fake_iface(net, "lo", &[("type", "772\n"), ("operstate", "unknown\n")]);

        let basic = detect_interfaces_in(net, false);
        let names: Vec<_> = basic.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["eth0", "wlan0"]);
        assert_eq!(basic[0].id, "AA:BB:CC:DD:EE:01");
        assert_eq!(basic[0].index, Some(2));
        assert_eq!(basic[1].id, "wlan0");
        assert_eq!(basic[1].adapter_type, AdapterType::Wifi);

        let advanced = detect_interfaces_in(net, true);
        assert!(advanced
            .iter()
            .any(|i| i.name == "ppp0" && i.adapter_type == AdapterType::Ppp));
        assert!(!advanced.iter().any(|i| i.name == "docker0" || i.name == "lo"));
    }

    #[test]
    fn test_randomized_mac_is_not_an_id() {
        let root = tempdir().unwrap();
        let net = root.path();
        let wlan = |address: &str| {
            fake_iface(
                net,
                "wlan0",
                &[
                    ("type", "1\n"),
                    ("operstate", "up\n"),
                    ("ifindex", "3\n"),
                    ("uevent", "DEVTYPE=wlan\n"),
                    ("addr_assign_type", "1\n"),
                    ("address", address),
                ],
            )
        };

        wlan("3a:11:22:33:44:55\n");
        let first = detect_interfaces_in(net, false);
        wlan("7e:66:77:88:99:aa\n");
        let second = detect_interfaces_in(net, false);

        assert_eq!(first[0].id, "wlan0");
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn test_permanent_mac_is_the_id() {
        let root = tempdir().unwrap();
        let net = root.path();
        fake_iface(
            net,
            "eth0",
            &[
                ("type", "1\n"),
                ("operstate", "up\n"),
                ("addr_assign_type", "0\n"),
                ("address", "00:00:00:00:00:00\n"),
            ],
        );
        fake_iface(
            net,
            "eth1",
            &[
                ("type", "1\n"),
                ("operstate", "up\n"),
                ("addr_assign_type", "3\n"),
                ("address", "02:00:00:00:00:01\n"),
            ],
        );

        let ids: Vec<_> = detect_interfaces_in(net, false)
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["eth0", "eth1"]);
    }

    #[test]
    fn test_missing_sysfs_yields_empty() {
        let root = tempdir().unwrap();
        assert!(detect_interfaces_in(&root.path().join("absent"), true).is_empty());
    }
}
