//! Where does traffic to an address end up?
//!
//! [`where_is`] follows the routing decision of a namespace across bridges
//! and veth pairs into other namespaces until the address is found assigned
//! to an interface.

use std::collections::HashSet;
use std::net::IpAddr;

use super::ForwardedPort;
use crate::sockets::{ProcessSocket, Protocol};
use crate::topology::{Family, InterfaceKind, NamespaceId, NifRef, Topology, longest_match};

/// Namespace and interface `ip` is delivered to when sent from `netns`.
pub fn where_is(topo: &Topology, netns: NamespaceId, ip: &IpAddr) -> Option<(NamespaceId, NifRef)> {
    let mut visited = HashSet::new();
    where_is_from(topo, netns, ip, &mut visited)
}

fn where_is_from(
    topo: &Topology,
    netns: NamespaceId,
    dest: &IpAddr,
    visited: &mut HashSet<(NamespaceId, IpAddr)>,
) -> Option<(NamespaceId, NifRef)> {
    let ns = topo.netns(netns)?;

    if let Some(nif) = ns.interface_with_address(dest) {
        return Some((netns, nif.nif_ref()));
    }
    // local subnets of lo have no routes
    if let Some(lo) = ns.loopback()
        && lo.addresses().any(|a| a.contains(dest))
    {
        return Some((netns, lo.nif_ref()));
    }

    let route = longest_match(ns.routes(Family::of(dest)), dest)?;
    let probe = route.gateway().unwrap_or(*dest);
    if !visited.insert((netns, probe)) {
        tracing::debug!(netns = %netns, %probe, "routing loop");
        return None;
    }

    let egress = topo.nif(route.nif.as_ref()?)?;
    let next = match &egress.details {
        InterfaceKind::Bridge { ports } => ports.iter().find_map(|port| peer_with(topo, port, &probe)),
        InterfaceKind::Veth { .. } => peer_with(topo, &egress.nif_ref(), &probe),
        _ => None,
    }?;
    where_is_from(topo, next, dest, visited)
}

/// Namespace of the veth peer of `nif` if that peer carries `ip`.
fn peer_with(topo: &Topology, nif: &NifRef, ip: &IpAddr) -> Option<NamespaceId> {
    let peer = topo.nif(nif)?.details.peer()?;
    topo.nif(peer)
        .filter(|p| p.has_address(ip))
        .map(|p| p.netns)
}

/// PIDs of sockets able to receive traffic for `port` on `ip`.
pub fn matching_pids(sockets: &[ProcessSocket], protocol: Protocol, port: u16, ip: &IpAddr) -> Vec<u32> {
    let mut pids: Vec<u32> = sockets
        .iter()
        .filter(|s| s.protocol == protocol && s.local_port == port)
        .filter(|s| protocol != Protocol::Tcp || s.is_listening())
        .filter(|s| s.local_ip.is_unspecified() || s.local_ip == *ip)
        .flat_map(|s| s.pids.iter().copied())
        .collect();
    pids.sort_unstable();
    pids.dedup();
    pids
}

/// Destination namespace, interface and serving processes of a forwarded
/// port discovered in `from`.
pub fn resolve_port(topo: &Topology, from: NamespaceId, port: &mut ForwardedPort) {
    let range = &port.range;
    let Some((netns, nif)) = where_is(topo, from, &range.forward_ip) else {
        tracing::debug!(netns = %from, "no destination for {range}");
        return;
    };
    port.destination_netns = Some(netns);
    port.nifs = vec![nif];

    let Some(dest) = topo.netns(netns) else { return };
    port.pids = matching_pids(
        dest.sockets(Family::of(&range.ip)),
        range.protocol,
        range.forward_port_min,
        &range.forward_ip,
    );
}

/// Resolve every forwarded port of every namespace.
pub fn resolve(topo: &mut Topology) {
    let ids: Vec<NamespaceId> = topo.namespaces.keys().copied().collect();
    for id in ids {
        let Some(ns) = topo.netns_mut(id) else { continue };
        let mut v4 = std::mem::take(&mut ns.forwarded_v4);
        let mut v6 = std::mem::take(&mut ns.forwarded_v6);

        for port in v4.iter_mut().chain(v6.iter_mut()) {
            resolve_port(topo, id, port);
        }

        if let Some(ns) = topo.netns_mut(id) {
            ns.forwarded_v4 = v4;
            ns.forwarded_v6 = v6;
        }
    }
}
