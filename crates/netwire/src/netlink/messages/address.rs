//! Strongly-typed address message.

use std::net::IpAddr;

use crate::netlink::attr::get;
use crate::netlink::parse::{FromNetlink, PResult, parse_attr, parse_header, parse_string_from_bytes};
use crate::netlink::types::addr::{IfAddrMsg, IfaCacheinfo, ifa};

#[derive(Debug, Clone, Default)]
pub struct AddressMessage {
    pub(crate) header: IfAddrMsg,
    pub(crate) address: Option<IpAddr>,
    pub(crate) local: Option<IpAddr>,
    pub(crate) label: Option<String>,
    pub(crate) flags: Option<u32>,
    pub(crate) cacheinfo: Option<IfaCacheinfo>,
}

impl AddressMessage {
    pub fn family(&self) -> u8 {
        self.header.ifa_family
    }

    pub fn prefix_len(&self) -> u8 {
        self.header.ifa_prefixlen
    }

    pub fn scope(&self) -> u8 {
        self.header.ifa_scope
    }

    pub fn index(&self) -> u32 {
        self.header.ifa_index
    }

    /// The interface's own address.
    ///
    /// On point-to-point links IFA_ADDRESS is the peer and IFA_LOCAL the
    /// local end, so IFA_LOCAL wins when present.
    pub fn address(&self) -> Option<IpAddr> {
        self.local.or(self.address)
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn flags(&self) -> u32 {
        self.flags.unwrap_or(self.header.ifa_flags as u32)
    }

    /// Preferred lifetime in seconds, `u32::MAX` meaning forever.
    pub fn preferred_lifetime(&self) -> u32 {
        self.cacheinfo.map_or(u32::MAX, |c| c.ifa_prefered)
    }

    /// Valid lifetime in seconds, `u32::MAX` meaning forever.
    pub fn valid_lifetime(&self) -> u32 {
        self.cacheinfo.map_or(u32::MAX, |c| c.ifa_valid)
    }
}

impl FromNetlink for AddressMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfAddrMsg::default().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, IfAddrMsg::SIZE)?;
        let header = IfAddrMsg::from_bytes(header_bytes)
            .copied()
            .unwrap_or_default();

        let mut msg = AddressMessage {
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let Ok((attr_type, data)) = parse_attr(input) else {
                break;
            };

            match attr_type {
                ifa::ADDRESS => msg.address = get::ip(data).ok(),
                ifa::LOCAL => msg.local = get::ip(data).ok(),
                ifa::LABEL => msg.label = Some(parse_string_from_bytes(data)),
                ifa::FLAGS => msg.flags = get::u32_ne(data).ok(),
                ifa::CACHEINFO => msg.cacheinfo = IfaCacheinfo::from_bytes(data).copied(),
                _ => {}
            }
        }

        Ok(msg)
    }
}
