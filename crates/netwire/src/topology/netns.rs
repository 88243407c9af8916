//! One discovered network namespace.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

use super::address::Family;
use super::interface::Interface;
use super::route::Route;
use super::NamespaceId;
use crate::portfwd::ForwardedPort;
use crate::sockets::ProcessSocket;

#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct NetworkNamespace {
    pub id: NamespaceId,
    /// Openable namespace reference.
    pub path: PathBuf,
    /// Leader (tenant) processes, smallest first.
    pub pids: Vec<u32>,
    pub interfaces: BTreeMap<u32, Interface>,
    pub names: BTreeMap<String, u32>,
    pub routes_v4: Vec<Route>,
    pub routes_v6: Vec<Route>,
    pub sockets_v4: Vec<ProcessSocket>,
    pub sockets_v6: Vec<ProcessSocket>,
    pub forwarded_v4: Vec<ForwardedPort>,
    pub forwarded_v6: Vec<ForwardedPort>,
    /// NSIDs this namespace assigned to its peers. Only meaningful here.
    #[cfg_attr(feature = "output", serde(skip))]
    pub(crate) nsids: BTreeMap<u32, NamespaceId>,
}

impl NetworkNamespace {
    pub fn new(id: NamespaceId, path: impl Into<PathBuf>, pids: Vec<u32>) -> Self {
        Self {
            id,
            path: path.into(),
            pids,
            ..Default::default()
        }
    }

    pub fn leader(&self) -> Option<u32> {
        self.pids.first().copied()
    }

    /// Insert an interface and index it by name.
    pub fn add_interface(&mut self, nif: Interface) {
        self.names.insert(nif.name.clone(), nif.index);
        self.interfaces.insert(nif.index, nif);
    }

    pub fn interface(&self, index: u32) -> Option<&Interface> {
        self.interfaces.get(&index)
    }

    pub fn interface_by_name(&self, name: &str) -> Option<&Interface> {
        self.names.get(name).and_then(|idx| self.interfaces.get(idx))
    }

    pub fn loopback(&self) -> Option<&Interface> {
        self.interfaces
            .values()
            .find(|nif| nif.loopback)
            .or_else(|| self.interface_by_name("lo"))
    }

    /// Interface carrying `ip` as an assigned address.
    pub fn interface_with_address(&self, ip: &IpAddr) -> Option<&Interface> {
        self.interfaces.values().find(|nif| nif.has_address(ip))
    }

    /// Peer namespace registered under a locally-scoped NSID.
    pub fn peer_by_nsid(&self, nsid: u32) -> Option<NamespaceId> {
        self.nsids.get(&nsid).copied()
    }

    pub fn set_nsid(&mut self, nsid: u32, peer: NamespaceId) {
        self.nsids.insert(nsid, peer);
    }

    pub fn routes(&self, family: Family) -> &[Route] {
        match family {
            Family::Ipv4 => &self.routes_v4,
            Family::Ipv6 => &self.routes_v6,
        }
    }

    pub fn sockets(&self, family: Family) -> &[ProcessSocket] {
        match family {
            Family::Ipv4 => &self.sockets_v4,
            Family::Ipv6 => &self.sockets_v6,
        }
    }

    pub fn forwarded_ports(&self) -> impl Iterator<Item = &ForwardedPort> {
        self.forwarded_v4.iter().chain(self.forwarded_v6.iter())
    }

    /// Interfaces with loopback first, then by name.
    pub fn sorted_interfaces(&self) -> Vec<&Interface> {
        let mut nifs: Vec<&Interface> = self.interfaces.values().collect();
        nifs.sort_by(|a, b| {
            b.loopback
                .cmp(&a.loopback)
                .then_with(|| a.name.cmp(&b.name))
        });
        nifs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Address;

    fn nif(index: u32, name: &str) -> Interface {
        Interface {
            index,
            name: name.into(),
            loopback: name == "lo",
            ..Default::default()
        }
    }

    #[test]
    fn loopback_sorts_first() {
        let mut ns = NetworkNamespace::new(NamespaceId(1), "/proc/1/ns/net", vec![1]);
        ns.add_interface(nif(3, "eth0"));
        ns.add_interface(nif(1, "lo"));
        ns.add_interface(nif(2, "br0"));
        let names: Vec<_> = ns.sorted_interfaces().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["lo", "br0", "eth0"]);
        assert_eq!(ns.loopback().unwrap().index, 1);
        assert_eq!(ns.interface_by_name("br0").unwrap().index, 2);
    }

    #[test]
    fn lookup_by_address_and_nsid() {
        let mut ns = NetworkNamespace::new(NamespaceId(1), "/proc/1/ns/net", vec![1]);
        let mut eth = nif(2, "eth0");
        eth.push_address(Address::new("10.0.0.5".parse().unwrap(), 24, 2));
        ns.add_interface(eth);
        ns.set_nsid(0, NamespaceId(7));

        assert_eq!(
            ns.interface_with_address(&"10.0.0.5".parse().unwrap()).unwrap().name,
            "eth0"
        );
        assert!(ns.interface_with_address(&"10.0.0.6".parse().unwrap()).is_none());
        assert_eq!(ns.peer_by_nsid(0), Some(NamespaceId(7)));
        assert_eq!(ns.peer_by_nsid(1), None);
    }
}
