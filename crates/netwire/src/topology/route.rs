//! Routes of the main and local tables.

use std::net::IpAddr;

use super::NifRef;
use super::address::{Family, prefix_matches};
use crate::netlink::messages::RouteMessage;
use crate::netlink::types::route::{RT_TABLE_LOCAL, RT_TABLE_MAIN, RouteType};

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Route {
    pub family: Family,
    pub route_type: RouteType,
    /// Destination network; the unspecified address for default routes.
    pub destination: IpAddr,
    pub prefix_len: u8,
    pub next_hop: Option<IpAddr>,
    /// Egress interface.
    pub nif: Option<NifRef>,
    pub table: u32,
    pub priority: u32,
    pub preference: u8,
}

impl Route {
    /// Convert a dumped route, keeping only the main and local tables.
    pub(crate) fn from_message(msg: &RouteMessage, family: Family, nif: impl Fn(u32) -> Option<NifRef>) -> Option<Self> {
        let table = msg.table_id();
        if table != RT_TABLE_MAIN && table != RT_TABLE_LOCAL {
            return None;
        }
        Some(Self {
            family,
            route_type: msg.route_type(),
            destination: msg.destination().unwrap_or(family.unspecified()),
            prefix_len: msg.dst_len(),
            next_hop: msg.gateway(),
            nif: msg.oif().and_then(nif),
            table,
            priority: msg.priority(),
            preference: msg.pref(),
        })
    }

    pub fn matches(&self, ip: &IpAddr) -> bool {
        prefix_matches(&self.destination, self.prefix_len, ip)
    }

    /// Next hop if set and specified.
    pub fn gateway(&self) -> Option<IpAddr> {
        self.next_hop.filter(|gw| !gw.is_unspecified())
    }
}

/// Route with the longest destination prefix covering `ip`; the first one
/// found wins ties.
pub fn longest_match<'a>(routes: &'a [Route], ip: &IpAddr) -> Option<&'a Route> {
    let mut best: Option<&Route> = None;
    for route in routes.iter().filter(|r| r.matches(ip)) {
        if best.is_none_or(|b| route.prefix_len > b.prefix_len) {
            best = Some(route);
        }
    }
    best
}
