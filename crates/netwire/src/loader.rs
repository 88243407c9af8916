//! Per-namespace link, address and route loading.
//!
//! [`fetch`] performs the netlink dumps on a connection that lives in the
//! target namespace; [`build_namespace`] turns the decoded messages into a
//! [`NetworkNamespace`] and is independent of the kernel.

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout};

use crate::inventory::NamespaceRef;
use crate::kind;
use crate::netlink::messages::{AddressMessage, LinkMessage, RouteMessage};
use crate::netlink::namespace;
use crate::netlink::types::addr::{AF_INET, AF_INET6};
use crate::netlink::{Connection, Protocol, Result};
use crate::topology::{Address, Family, NamespaceId, NetworkNamespace, NifRef, Route};

/// Everything dumped from one namespace.
#[derive(Debug, Clone, Default)]
pub struct LinkDump {
    pub links: Vec<LinkMessage>,
    pub addresses: Vec<AddressMessage>,
    pub routes: Vec<RouteMessage>,
}

/// Open a connection living in `ns`; no namespace switch for our own.
pub fn connect(protocol: Protocol, ns: &NamespaceRef, self_netns: NamespaceId) -> Result<Connection> {
    if ns.id == self_netns {
        return Connection::new(protocol);
    }
    let fd = namespace::open_path(&ns.path)?;
    Connection::new_in_namespace(protocol, fd.as_raw_fd())
}

/// Dump links, addresses and routes of both families.
pub async fn fetch(conn: &Connection) -> Result<LinkDump> {
    let links = conn.get_links().await?;
    let mut addresses = conn.get_addresses(AF_INET).await?;
    addresses.extend(conn.get_addresses(AF_INET6).await?);
    let mut routes = conn.get_routes(AF_INET).await?;
    routes.extend(conn.get_routes(AF_INET6).await?);
    Ok(LinkDump {
        links,
        addresses,
        routes,
    })
}

/// Build the namespace model from dumped messages.
///
/// Relations are left unresolved; only the raw hints are recorded.
pub fn build_namespace(ns: &NamespaceRef, dump: &LinkDump) -> NetworkNamespace {
    let mut netns = NetworkNamespace::new(ns.id, &ns.path, ns.pids.clone());

    for link in &dump.links {
        netns.add_interface(kind::build_interface(ns.id, link));
    }

    for msg in &dump.addresses {
        let Some(addr) = Address::from_message(msg) else {
            tracing::trace!(index = msg.index(), "address message without address");
            continue;
        };
        match netns.interfaces.get_mut(&addr.index) {
            Some(nif) => nif.push_address(addr),
            None => tracing::trace!(index = addr.index, "address of unknown interface"),
        }
    }
    for nif in netns.interfaces.values_mut() {
        nif.addrs_v4.sort();
        nif.addrs_v6.sort();
    }

    let known = |index: u32| {
        netns
            .interfaces
            .contains_key(&index)
            .then_some(NifRef::new(ns.id, index))
    };
    let mut routes_v4 = Vec::new();
    let mut routes_v6 = Vec::new();
    for msg in &dump.routes {
        let (family, list) = match msg.family() {
            AF_INET => (Family::Ipv4, &mut routes_v4),
            AF_INET6 => (Family::Ipv6, &mut routes_v6),
            _ => continue,
        };
        if let Some(route) = Route::from_message(msg, family, known) {
            list.push(route);
        }
    }
    netns.routes_v4 = routes_v4;
    netns.routes_v6 = routes_v6;

    netns
}

/// Load one namespace over a route connection living in it: dump, build,
/// then discover bus addresses.
pub async fn load(conn: &Connection, ns: &NamespaceRef, self_netns: NamespaceId) -> Result<NetworkNamespace> {
    let dump = fetch(conn).await?;
    let mut netns = build_namespace(ns, &dump);

    if let Err(e) = fill_bus_addresses(&mut netns, ns, self_netns) {
        tracing::warn!(netns = %ns.id, "cannot query bus addresses: {e}");
    }
    Ok(netns)
}

// ============================================================================
// ethtool bus address discovery
// ============================================================================

const SIOCETHTOOL: libc::c_ulong = 0x8946;
const ETHTOOL_GDRVINFO: u32 = 0x0000_0003;

/// struct ethtool_drvinfo.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
struct EthtoolDrvinfo {
    cmd: u32,
    driver: [u8; 32],
    version: [u8; 32],
    fw_version: [u8; 32],
    bus_info: [u8; 32],
    erom_version: [u8; 32],
    reserved2: [u8; 12],
    n_priv_flags: u32,
    n_stats: u32,
    testinfo_len: u32,
    eedump_len: u32,
    regdump_len: u32,
}

/// Socket for ethtool ioctls, created inside the namespace it queries.
struct EthtoolSocket {
    fd: OwnedFd,
}

impl EthtoolSocket {
    fn open() -> std::io::Result<Self> {
        // SAFETY: plain socket(2); the returned fd is checked before use.
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: fd is a freshly created, owned descriptor.
        Ok(Self {
            fd: unsafe { OwnedFd::from_raw_fd(fd) },
        })
    }

    fn bus_info(&self, ifname: &str) -> Option<String> {
        if ifname.len() >= libc::IFNAMSIZ {
            return None;
        }

        let mut info = EthtoolDrvinfo::new_zeroed();
        info.cmd = ETHTOOL_GDRVINFO;

        // SAFETY: ifreq is plain old data; all-zero is a valid value.
        let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
        for (dst, src) in ifr.ifr_name.iter_mut().zip(ifname.bytes()) {
            *dst = src as libc::c_char;
        }
        ifr.ifr_ifru.ifru_data = (&mut info as *mut EthtoolDrvinfo).cast();

        // SAFETY: ifr points to a valid ethtool_drvinfo for the call's duration.
        let ret = unsafe { libc::ioctl(self.fd.as_raw_fd(), SIOCETHTOOL as _, &mut ifr) };
        if ret < 0 {
            tracing::trace!(ifname, "GDRVINFO failed: {}", std::io::Error::last_os_error());
            return None;
        }

        let bus = crate::netlink::parse::parse_string_from_bytes(&info.bus_info);
        (!bus.is_empty() && bus != "N/A").then_some(bus)
    }
}

/// Set the bus address of every physical interface. The ethtool socket is
/// only opened when the namespace has physical interfaces.
fn fill_bus_addresses(netns: &mut NetworkNamespace, ns: &NamespaceRef, self_netns: NamespaceId) -> Result<()> {
    if !netns.interfaces.values().any(|nif| nif.physical) {
        return Ok(());
    }

    let socket = if ns.id == self_netns {
        EthtoolSocket::open()?
    } else {
        namespace::execute_in(&ns.path, EthtoolSocket::open)??
    };

    for nif in netns.interfaces.values_mut().filter(|nif| nif.physical) {
        nif.bus_addr = socket.bus_info(&nif.name);
    }
    Ok(())
}
