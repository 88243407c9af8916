//! Interface kind registry.
//!
//! A link's `IFLA_INFO_KIND` selects a constructor that decodes the
//! kind-specific `IFLA_INFO_DATA`. Kinds without a constructor get
//! [`InterfaceKind::Generic`]; links without a kind are `device`s.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::LazyLock;

use crate::netlink::attr::{AttrIter, get};
use crate::netlink::messages::LinkMessage;
use crate::netlink::parse::format_hw_addr;
use crate::netlink::types::link::{IFF_PROMISC, MacvlanMode, macvlan, tun, vlan, vxlan};
use crate::topology::{Interface, InterfaceKind, LinkHints, NamespaceId, TunTapMode, VxlanInfo};

/// Kind string of links that report none.
pub const DEVICE_KIND: &str = "device";

type Constructor = fn(&[u8]) -> InterfaceKind;

static REGISTRY: LazyLock<HashMap<&'static str, Constructor>> = LazyLock::new(|| {
    let mut m: HashMap<&'static str, Constructor> = HashMap::new();
    m.insert("bridge", |_| InterfaceKind::Bridge { ports: Vec::new() });
    m.insert("veth", |_| InterfaceKind::Veth { peer: None });
    m.insert("macvlan", decode_macvlan);
    m.insert("macvtap", decode_macvlan);
    m.insert("vlan", decode_vlan);
    m.insert("vxlan", decode_vxlan);
    m.insert("tun", decode_tun);
    m
});

/// Kinds with a dedicated constructor.
pub fn registered_kinds() -> Vec<&'static str> {
    let mut kinds: Vec<_> = REGISTRY.keys().copied().collect();
    kinds.sort_unstable();
    kinds
}

/// Kind-specific details for `kind`, decoded from its info data.
pub fn details_for(kind: &str, info_data: &[u8]) -> InterfaceKind {
    REGISTRY
        .get(kind)
        .map_or(InterfaceKind::Generic, |make| make(info_data))
}

/// Build a typed interface from a dumped link. Addresses are added later.
pub fn build_interface(netns: NamespaceId, link: &LinkMessage) -> Interface {
    let kind = link.kind().unwrap_or(DEVICE_KIND).to_string();
    let info_data = link.info_data().unwrap_or_default();
    let details = details_for(&kind, info_data);

    let mut hints = LinkHints {
        master: link.master().filter(|&m| m != 0),
        link: link.link().filter(|&l| l != 0),
        link_nsid: link.link_netnsid(),
    };
    if kind == "vxlan" {
        hints.link = vxlan_link(info_data);
    }

    let loopback = link.is_loopback();
    let hw_addr = link
        .address()
        .filter(|a| !a.is_empty())
        .map_or_else(|| format_hw_addr(&[0; 6]), format_hw_addr);

    Interface {
        netns,
        physical: kind == DEVICE_KIND && !loopback,
        kind,
        name: link.name().unwrap_or_default().to_string(),
        alias: link.alias().unwrap_or_default().to_string(),
        index: link.index(),
        state: link.operstate(),
        loopback,
        promiscuous: link.flags() & IFF_PROMISC != 0,
        hw_addr,
        details,
        hints,
        ..Default::default()
    }
}

fn decode_macvlan(data: &[u8]) -> InterfaceKind {
    let mode = AttrIter::new(data)
        .find(|(t, _)| *t == macvlan::MODE)
        .and_then(|(_, d)| get::u32_ne(d).ok())
        .unwrap_or(0);
    InterfaceKind::Macvlan {
        master: None,
        mode: MacvlanMode::from(mode),
    }
}

fn decode_vlan(data: &[u8]) -> InterfaceKind {
    let mut vid = 0;
    let mut protocol = 0x8100;
    for (t, d) in AttrIter::new(data) {
        match t {
            vlan::ID => vid = get::u16_ne(d).unwrap_or(0),
            vlan::PROTOCOL => protocol = get::u16_be(d).unwrap_or(protocol),
            _ => {}
        }
    }
    InterfaceKind::Vlan {
        master: None,
        vid,
        protocol,
    }
}

fn vxlan_link(data: &[u8]) -> Option<u32> {
    AttrIter::new(data)
        .find(|(t, _)| *t == vxlan::LINK)
        .and_then(|(_, d)| get::u32_ne(d).ok())
        .filter(|&l| l != 0)
}

fn decode_vxlan(data: &[u8]) -> InterfaceKind {
    let mut info = VxlanInfo::default();
    let ip = |d: &[u8]| get::ip(d).ok().filter(|ip: &IpAddr| !ip.is_unspecified());
    for (t, d) in AttrIter::new(data) {
        match t {
            vxlan::ID => info.vni = get::u32_ne(d).unwrap_or(0),
            vxlan::GROUP | vxlan::GROUP6 => info.group = info.group.or(ip(d)),
            vxlan::LOCAL | vxlan::LOCAL6 => info.local = info.local.or(ip(d)),
            vxlan::TTL => info.ttl = get::u8(d).unwrap_or(0),
            vxlan::TOS => info.tos = get::u8(d).unwrap_or(0),
            vxlan::PORT => info.destination_port = get::u16_be(d).unwrap_or(0),
            vxlan::PORT_RANGE => {
                info.source_port_low = get::u16_be(d).unwrap_or(0);
                info.source_port_high = d.get(2..).and_then(|h| get::u16_be(h).ok()).unwrap_or(0);
            }
            vxlan::PROXY => info.arp_proxy = get::u8(d).unwrap_or(0) != 0,
            _ => {}
        }
    }
    InterfaceKind::Vxlan(info)
}

fn decode_tun(data: &[u8]) -> InterfaceKind {
    let mode = match AttrIter::new(data)
        .find(|(t, _)| *t == tun::TYPE)
        .and_then(|(_, d)| get::u8(d).ok())
    {
        Some(1) => TunTapMode::Tun,
        Some(2) => TunTapMode::Tap,
        _ => TunTapMode::Unknown,
    };
    InterfaceKind::TunTap {
        mode,
        processors: Vec::new(),
    }
}
