//! Turning socket table rows into [`ProcessSocket`]s.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use super::{InodeMap, ProcessSocket, Protocol, SocketRecord, SocketState, read_table};
use crate::topology::{Family, NetworkNamespace, NifRef};

/// Local address to the interfaces carrying it. The unspecified addresses
/// map to every interface of the namespace.
#[derive(Debug, Clone, Default)]
pub struct AddressIndex {
    by_ip: HashMap<IpAddr, Vec<NifRef>>,
}

impl AddressIndex {
    pub fn new(netns: &NetworkNamespace) -> Self {
        let mut by_ip: HashMap<IpAddr, Vec<NifRef>> = HashMap::new();
        let all: Vec<NifRef> = netns.interfaces.values().map(|nif| nif.nif_ref()).collect();
        for nif in netns.interfaces.values() {
            for addr in nif.addresses() {
                by_ip.entry(addr.ip).or_default().push(nif.nif_ref());
            }
        }
        by_ip.insert(IpAddr::V4(Ipv4Addr::UNSPECIFIED), all.clone());
        by_ip.insert(Family::Ipv6.unspecified(), all);
        Self { by_ip }
    }

    pub fn lookup(&self, ip: &IpAddr) -> Vec<NifRef> {
        self.by_ip.get(ip).cloned().unwrap_or_default()
    }
}

/// IPv4 view of an IPv6 address that is unspecified or IPv4-mapped.
fn ipv4_view(ip: &IpAddr) -> Option<Ipv4Addr> {
    match ip {
        IpAddr::V6(v6) if v6.is_unspecified() => Some(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
        IpAddr::V4(_) => None,
    }
}

/// Address to look up bound interfaces with; IPv4-mapped addresses are
/// assigned as plain IPv4.
fn bound_ip(ip: &IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(*ip, IpAddr::V4),
        IpAddr::V4(_) => *ip,
    }
}

fn make_socket(
    family: Family,
    protocol: Protocol,
    record: &SocketRecord,
    inodes: &InodeMap,
    addrs: &AddressIndex,
) -> Option<ProcessSocket> {
    let Some(state) = SocketState::from_code(record.state) else {
        tracing::trace!(state = record.state, "unknown socket state");
        return None;
    };
    let simple_state = state.simple(protocol)?;
    Some(ProcessSocket {
        family,
        protocol,
        local_ip: record.local_ip,
        local_port: record.local_port,
        remote_ip: record.remote_ip,
        remote_port: record.remote_port,
        state,
        simple_state,
        pids: inodes.owners(record.inode).to_vec(),
        ipv4_mapped: false,
        nifs: addrs.lookup(&bound_ip(&record.local_ip)),
    })
}

/// Build the IPv4 and IPv6 sockets of one protocol.
///
/// IPv6 sockets that also accept IPv4 get an aliased IPv4 socket marked
/// `ipv4_mapped`, unless an explicit IPv4 socket already covers the same
/// local address and port. Aliases never cover each other: every accepted
/// connection of a dual-stack listener gets its own.
pub fn correlate(
    protocol: Protocol,
    v4: &[SocketRecord],
    v6: &[SocketRecord],
    inodes: &InodeMap,
    addrs: &AddressIndex,
) -> (Vec<ProcessSocket>, Vec<ProcessSocket>) {
    let mut out_v4: Vec<ProcessSocket> = v4
        .iter()
        .filter_map(|r| make_socket(Family::Ipv4, protocol, r, inodes, addrs))
        .collect();
    let covered: HashSet<(IpAddr, u16)> = out_v4.iter().map(|s| (s.local_ip, s.local_port)).collect();

    let mut out_v6 = Vec::with_capacity(v6.len());
    for record in v6 {
        let Some(socket) = make_socket(Family::Ipv6, protocol, record, inodes, addrs) else {
            continue;
        };

        if let (Some(local), Some(remote)) = (ipv4_view(&socket.local_ip), ipv4_view(&socket.remote_ip))
            && !covered.contains(&(IpAddr::V4(local), socket.local_port))
        {
            out_v4.push(ProcessSocket {
                family: Family::Ipv4,
                local_ip: IpAddr::V4(local),
                remote_ip: IpAddr::V4(remote),
                ipv4_mapped: true,
                nifs: addrs.lookup(&IpAddr::V4(local)),
                ..socket.clone()
            });
        }
        out_v6.push(socket);
    }

    (out_v4, out_v6)
}

/// Discover the sockets of a namespace through its leader process.
pub fn discover(netns: &NetworkNamespace, proc_root: &Path, inodes: &InodeMap) -> (Vec<ProcessSocket>, Vec<ProcessSocket>) {
    let Some(leader) = netns.leader() else {
        tracing::debug!(netns = %netns.id, "no leader process, skipping sockets");
        return (Vec::new(), Vec::new());
    };
    let addrs = AddressIndex::new(netns);

    let read = |protocol: Protocol, family: Family| {
        read_table(proc_root, leader, protocol, family).unwrap_or_else(|e| {
            tracing::debug!(netns = %netns.id, leader, %protocol, "cannot read socket table: {e}");
            Vec::new()
        })
    };

    let mut all_v4 = Vec::new();
    let mut all_v6 = Vec::new();
    for protocol in [Protocol::Tcp, Protocol::Udp] {
        let (v4, v6) = correlate(
            protocol,
            &read(protocol, Family::Ipv4),
            &read(protocol, Family::Ipv6),
            inodes,
            &addrs,
        );
        all_v4.extend(v4);
        all_v6.extend(v6);
    }

    all_v4.sort_by(ProcessSocket::listing_order);
    all_v6.sort_by(ProcessSocket::listing_order);
    (all_v4, all_v6)
}
