// AutoDNS - Network Interface Model
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Selectable network interfaces.
//!
//! The list is rebuilt on every scan. Selection survives a rescan because it
//! is keyed by the interface's stable id rather than by its position or name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Type of network adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    /// Wired Ethernet adapter.
    Ethernet,
    /// Wireless (WiFi) adapter.
    Wifi,
    /// Point-to-point link (dial-up, PPPoE).
    Ppp,
    /// Virtual adapter (bridges, VLANs, tunnels).
    Virtual,
    /// Loopback interface.
    Loopback,
    /// Unknown or other type.
    Other,
}

impl AdapterType {
    /// Get human-readable name for this adapter type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ethernet => "Ethernet",
            Self::Wifi => "Wi-Fi",
            Self::Ppp => "PPP",
            Self::Virtual => "Virtual",
            Self::Loopback => "Loopback",
            Self::Other => "Network",
        }
    }

    /// Whether interfaces of this type are offered for selection.
    ///
    /// Ethernet and Wi-Fi always are; PPP and unknown types only when the
    /// advanced list is requested. Loopback and virtual never are.
    pub fn is_selectable(&self, include_advanced: bool) -> bool {
        match self {
            Self::Ethernet | Self::Wifi => true,
            Self::Ppp | Self::Other => include_advanced,
            Self::Virtual | Self::Loopback => false,
        }
    }
}

/// One selectable network adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceItem {
    /// Display name (alias); may change at OS level.
    pub name: String,
    /// Stable identifier used to keep the selection across rescans.
    pub id: String,
    /// Numeric index, preferred handle for configuration calls.
    pub index: Option<u32>,
    /// Adapter type as detected.
    pub adapter_type: AdapterType,
}

impl InterfaceItem {
    pub fn new(name: impl Into<String>, id: impl Into<String>, index: Option<u32>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            index,
            adapter_type: AdapterType::Ethernet,
        }
    }
}

impl fmt::Display for InterfaceItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{} (ifindex={})", self.name, index),
            None => f.write_str(&self.name),
        }
    }
}

/// Scanned interfaces plus the ids the user selected.
#[derive(Debug, Clone, Default)]
pub struct InterfaceSelection {
    items: Vec<InterfaceItem>,
    selected: BTreeSet<String>,
}

impl InterfaceSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scanned list.
    ///
    /// Ids that were selected before stay selected, interfaces never seen
    /// before start selected, and ids that vanished are forgotten.
    pub fn rescan(&mut self, items: Vec<InterfaceItem>) {
        let previous: BTreeSet<String> = self.items.iter().map(|i| i.id.clone()).collect();
        let selected = items
            .iter()
            .filter(|i| self.selected.contains(&i.id) || !previous.contains(&i.id))
            .map(|i| i.id.clone())
            .collect();
        self.items = items;
        self.selected = selected;
    }

    /// Select or deselect by id. Returns false if the id is unknown.
    pub fn set_selected(&mut self, id: &str, selected: bool) -> bool {
        if !self.items.iter().any(|i| i.id == id) {
            return false;
        }
        if selected {
            self.selected.insert(id.to_string());
        } else {
            self.selected.remove(id);
        }
        true
    }

    pub fn select_all(&mut self, selected: bool) {
        if selected {
            self.selected = self.items.iter().map(|i| i.id.clone()).collect();
        } else {
            self.selected.clear();
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.contains(id)
    }

    /// All scanned interfaces in scan order.
    pub fn items(&self) -> &[InterfaceItem] {
        &self.items
    }

    /// Selected interfaces in scan order.
    pub fn selected_items(&self) -> Vec<InterfaceItem> {
        self.items
            .iter()
            .filter(|i| self.selected.contains(&i.id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, id: &str) -> InterfaceItem {
        InterfaceItem::new(name, id, None)
    }

    #[test]
    fn test_rescan_preserves_selection_by_id() {
        let mut sel = InterfaceSelection::new();
        sel.rescan(vec![item("eth0", "a"), item("wlan0", "b")]);
        assert!(sel.is_selected("a") && sel.is_selected("b"));

        assert!(sel.set_selected("b", false));
        // Alias changed, id kept; a new adapter appeared.
        sel.rescan(vec![item("wlan-renamed", "b"), item("eth0", "a"), item("usb0", "c")]);

        assert!(sel.is_selected("a"));
        assert!(!sel.is_selected("b"));
        assert!(sel.is_selected("c"));
        let names: Vec<_> = sel.selected_items().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["eth0", "usb0"]);
    }

    #[test]
    fn test_rescan_drops_vanished_ids() {
        let mut sel = InterfaceSelection::new();
        sel.rescan(vec![item("eth0", "a"), item("wlan0", "b")]);
        sel.rescan(vec![item("eth0", "a")]);
        let ids: Vec<_> = sel.selected_items().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["a"]);
        assert!(!sel.set_selected("b", true));
    }

    #[test]
    fn test_selectable_types() {
        assert!(AdapterType::Wifi.is_selectable(false));
        assert!(!AdapterType::Ppp.is_selectable(false));
        assert!(AdapterType::Ppp.is_selectable(true));
        assert!(!AdapterType::Loopback.is_selectable(true));
    }
}
