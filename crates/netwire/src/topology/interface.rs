//! Network interfaces and their kind-specific details.

use std::net::IpAddr;

use super::address::Address;
use super::{NamespaceId, NifRef};
use crate::netlink::types::link::{MacvlanMode, OperState};

/// Role of an interface in SR-IOV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
pub enum SriovRole {
    /// Not a PCI device, or SR-IOV not enabled.
    #[default]
    None,
    /// Physical function.
    Pf,
    /// Virtual function.
    Vf,
}

/// Raw relation hints from netlink, consumed by relation resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkHints {
    /// IFLA_MASTER.
    pub master: Option<u32>,
    /// IFLA_LINK, or IFLA_VXLAN_LINK for vxlan.
    pub link: Option<u32>,
    /// IFLA_LINK_NETNSID when assigned.
    pub link_nsid: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
pub enum TunTapMode {
    #[default]
    Unknown,
    Tun,
    Tap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct VxlanInfo {
    pub master: Option<NifRef>,
    pub vni: u32,
    /// Remote (unicast) or multicast group address.
    pub group: Option<IpAddr>,
    pub local: Option<IpAddr>,
    pub destination_port: u16,
    pub source_port_low: u16,
    pub source_port_high: u16,
    pub ttl: u8,
    pub tos: u8,
    pub arp_proxy: bool,
}

/// Kind-specific payload of an [`Interface`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(tag = "type", rename_all = "lowercase"))]
pub enum InterfaceKind {
    #[default]
    Generic,
    Bridge {
        ports: Vec<NifRef>,
    },
    Veth {
        peer: Option<NifRef>,
    },
    Macvlan {
        master: Option<NifRef>,
        mode: MacvlanMode,
    },
    Vlan {
        master: Option<NifRef>,
        vid: u16,
        /// Ethertype, e.g. 0x8100.
        protocol: u16,
    },
    Vxlan(VxlanInfo),
    TunTap {
        mode: TunTapMode,
        processors: Vec<u32>,
    },
}

impl InterfaceKind {
    /// Master reference of stacked kinds (macvlan, vlan, vxlan).
    pub fn master(&self) -> Option<&NifRef> {
        match self {
            Self::Macvlan { master, .. } | Self::Vlan { master, .. } => master.as_ref(),
            Self::Vxlan(info) => info.master.as_ref(),
            _ => None,
        }
    }

    pub(crate) fn master_slot(&mut self) -> Option<&mut Option<NifRef>> {
        match self {
            Self::Macvlan { master, .. } | Self::Vlan { master, .. } => Some(master),
            Self::Vxlan(info) => Some(&mut info.master),
            _ => None,
        }
    }

    pub fn peer(&self) -> Option<&NifRef> {
        match self {
            Self::Veth { peer } => peer.as_ref(),
            _ => None,
        }
    }

    pub fn ports(&self) -> &[NifRef] {
        match self {
            Self::Bridge { ports } => ports,
            _ => &[],
        }
    }
}

/// A network interface inside a namespace.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Interface {
    pub netns: NamespaceId,
    /// Link kind, `device` for links without one.
    pub kind: String,
    pub name: String,
    pub alias: String,
    /// Unique only within the owning namespace.
    pub index: u32,
    pub state: OperState,
    pub loopback: bool,
    /// Has a driver (kind `device`, not loopback).
    pub physical: bool,
    pub promiscuous: bool,
    pub hw_addr: String,
    pub addrs_v4: Vec<Address>,
    pub addrs_v6: Vec<Address>,
    /// PCI bus address of physical interfaces.
    pub bus_addr: Option<String>,
    pub sriov_role: SriovRole,
    /// Bridge this interface is a port of.
    pub bridge: Option<NifRef>,
    /// Stacked interfaces and SR-IOV virtual functions.
    pub slaves: Vec<NifRef>,
    /// Physical function of an SR-IOV virtual function.
    pub pf: Option<NifRef>,
    pub details: InterfaceKind,
    #[cfg_attr(feature = "output", serde(skip))]
    pub hints: LinkHints,
}

impl Interface {
    pub fn nif_ref(&self) -> NifRef {
        NifRef::new(self.netns, self.index)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.addrs_v4.iter().chain(self.addrs_v6.iter())
    }

    /// Whether `ip` is assigned to this interface.
    pub fn has_address(&self, ip: &IpAddr) -> bool {
        self.addresses().any(|a| a.ip == *ip)
    }

    pub fn push_address(&mut self, addr: Address) {
        match addr.family {
            super::Family::Ipv4 => self.addrs_v4.push(addr),
            super::Family::Ipv6 => self.addrs_v6.push(addr),
        }
    }

    pub fn is_bridge(&self) -> bool {
        matches!(self.details, InterfaceKind::Bridge { .. })
    }
}
