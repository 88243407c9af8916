//! The discovered topology.
//!
//! [`Topology`] is an arena of namespaces keyed by their kernel identity.
//! Interfaces refer to each other through [`NifRef`] pairs of (namespace,
//! ifindex) that are looked up through the arena, so relations may cross
//! namespace boundaries without any owning references.

mod address;
mod interface;
mod netns;
mod route;

use std::collections::BTreeMap;
use std::fmt;

pub use address::{Address, Family, exploded, prefix_matches};
pub use interface::{Interface, InterfaceKind, LinkHints, SriovRole, TunTapMode, VxlanInfo};
pub use netns::NetworkNamespace;
pub use route::{Route, longest_match};

/// Kernel identity of a network namespace: its nsfs inode number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(transparent))]
pub struct NamespaceId(pub u64);

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net:[{}]", self.0)
    }
}

/// Reference to an interface: (namespace, ifindex).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct NifRef {
    pub netns: NamespaceId,
    pub index: u32,
}

impl NifRef {
    pub fn new(netns: NamespaceId, index: u32) -> Self {
        Self { netns, index }
    }
}

/// All discovered namespaces and the names of the processes referenced by
/// them. Read-only once discovery returns.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Topology {
    pub namespaces: BTreeMap<NamespaceId, NetworkNamespace>,
    /// PID to process name.
    pub processes: BTreeMap<u32, String>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, netns: NetworkNamespace) {
        self.namespaces.insert(netns.id, netns);
    }

    pub fn netns(&self, id: NamespaceId) -> Option<&NetworkNamespace> {
        self.namespaces.get(&id)
    }

    pub fn netns_mut(&mut self, id: NamespaceId) -> Option<&mut NetworkNamespace> {
        self.namespaces.get_mut(&id)
    }

    pub fn nif(&self, r: &NifRef) -> Option<&Interface> {
        self.namespaces.get(&r.netns)?.interfaces.get(&r.index)
    }

    pub fn nif_mut(&mut self, r: &NifRef) -> Option<&mut Interface> {
        self.namespaces.get_mut(&r.netns)?.interfaces.get_mut(&r.index)
    }

    /// Every interface reference across all namespaces, in arena order.
    pub fn nif_refs(&self) -> Vec<NifRef> {
        self.namespaces
            .values()
            .flat_map(|ns| ns.interfaces.values().map(Interface::nif_ref))
            .collect()
    }

    /// Total number of interfaces.
    pub fn nif_count(&self) -> usize {
        self.namespaces.values().map(|ns| ns.interfaces.len()).sum()
    }
}
