//! Cross-interface relation resolution.
//!
//! Runs once every namespace has been loaded and has its NSID map. Relations
//! are written as [`NifRef`]s through the topology arena; the raw netlink
//! hints recorded by the loader are the only input.

use crate::topology::{InterfaceKind, LinkHints, NamespaceId, NifRef, Topology};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkRole {
    Peer,
    Master,
}

/// Resolve bridge ports, veth peers and stacked-interface masters.
pub fn resolve(topo: &mut Topology) {
    resolve_bridge_ports(topo);
    resolve_links(topo);
}

fn resolve_bridge_ports(topo: &mut Topology) {
    for ns in topo.namespaces.values_mut() {
        let slaves: Vec<(u32, u32)> = ns
            .interfaces
            .values()
            .filter_map(|nif| nif.hints.master.map(|m| (nif.index, m)))
            .collect();

        for (index, master) in slaves {
            let port = NifRef::new(ns.id, index);
            let Some(bridge) = ns.interfaces.get_mut(&master) else {
                tracing::warn!(netns = %ns.id, index, master, "master interface not found");
                continue;
            };
            let InterfaceKind::Bridge { ports } = &mut bridge.details else {
                tracing::debug!(
                    netns = %ns.id, index, master = %bridge.name, kind = %bridge.kind,
                    "master is not a bridge"
                );
                continue;
            };
            if !ports.contains(&port) {
                ports.push(port);
            }
            let bridge_ref = bridge.nif_ref();
            if let Some(nif) = ns.interfaces.get_mut(&index) {
                nif.bridge = Some(bridge_ref);
            }
        }
    }
}

/// Target of an interface's link hint, or `None` when it cannot be resolved.
fn link_target(topo: &Topology, from: NifRef, hints: LinkHints) -> Option<NifRef> {
    let index = match (hints.link, hints.link_nsid) {
        (Some(link), _) => link,
        // the kernel omits IFLA_LINK when it equals our own index
        (None, Some(_)) => from.index,
        (None, None) => return None,
    };

    let netns = match hints.link_nsid {
        Some(nsid) => {
            let owner = topo.netns(from.netns)?;
            let Some(peer) = owner.peer_by_nsid(nsid) else {
                tracing::warn!(netns = %from.netns, index = from.index, nsid, "unknown link nsid");
                return None;
            };
            peer
        }
        None => from.netns,
    };

    let target = NifRef::new(netns, index);
    if topo.nif(&target).is_none() {
        tracing::warn!(netns = %from.netns, index = from.index, target_netns = %netns, target = index, "link target not found");
        return None;
    }
    Some(target)
}

fn resolve_links(topo: &mut Topology) {
    let pending: Vec<(NifRef, LinkRole, LinkHints)> = topo
        .namespaces
        .values()
        .flat_map(|ns| ns.interfaces.values())
        .filter_map(|nif| {
            let role = match nif.details {
                InterfaceKind::Veth { .. } => LinkRole::Peer,
                InterfaceKind::Macvlan { .. } | InterfaceKind::Vlan { .. } | InterfaceKind::Vxlan(_) => {
                    LinkRole::Master
                }
                _ => return None,
            };
            Some((nif.nif_ref(), role, nif.hints))
        })
        .collect();

    for (from, role, hints) in pending {
        match role {
            LinkRole::Peer => resolve_peer(topo, from, hints),
            LinkRole::Master => resolve_master(topo, from, hints),
        }
    }
}

fn resolve_peer(topo: &mut Topology, from: NifRef, hints: LinkHints) {
    if topo.nif(&from).and_then(|n| n.details.peer()).is_some() {
        return;
    }
    let Some(target) = link_target(topo, from, hints) else {
        return;
    };

    let Some(other) = topo.nif(&target) else {
        return;
    };
    let InterfaceKind::Veth { peer: other_peer } = other.details else {
        tracing::warn!(netns = %from.netns, index = from.index, peer = %other.name, "veth peer is not a veth");
        return;
    };
    if let Some(existing) = other_peer.filter(|p| *p != from) {
        tracing::warn!(
            netns = %from.netns, index = from.index,
            peer_netns = %target.netns, peer = target.index,
            existing_netns = %existing.netns, existing = existing.index,
            "inconsistent veth pair"
        );
        return;
    }

    set_peer(topo, from, target);
    set_peer(topo, target, from);
}

fn set_peer(topo: &mut Topology, at: NifRef, to: NifRef) {
    if let Some(nif) = topo.nif_mut(&at)
        && let InterfaceKind::Veth { peer } = &mut nif.details
    {
        *peer = Some(to);
    }
}

fn resolve_master(topo: &mut Topology, from: NifRef, hints: LinkHints) {
    let Some(target) = link_target(topo, from, hints) else {
        return;
    };

    if let Some(slot) = topo.nif_mut(&from).and_then(|n| n.details.master_slot()) {
        *slot = Some(target);
    }
    if let Some(master) = topo.nif_mut(&target)
        && !master.slaves.contains(&from)
    {
        master.slaves.push(from);
    }
}

/// Namespaces a namespace's interfaces are linked into, for diagnostics.
pub fn linked_namespaces(topo: &Topology, netns: NamespaceId) -> Vec<NamespaceId> {
    let Some(ns) = topo.netns(netns) else {
        return Vec::new();
    };
    let mut out: Vec<NamespaceId> = ns
        .interfaces
        .values()
        .filter_map(|nif| nif.details.peer().or(nif.details.master()))
        .map(|r| r.netns)
        .filter(|id| *id != netns)
        .collect();
    out.sort_unstable();
    out.dedup();
    out
}
