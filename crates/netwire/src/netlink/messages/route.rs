//! Strongly-typed route message.

use std::net::IpAddr;

use crate::netlink::attr::get;
use crate::netlink::parse::{FromNetlink, PResult, parse_attr, parse_header};
use crate::netlink::types::route::{RouteType, RtMsg, rta};

#[derive(Debug, Clone, Default)]
pub struct RouteMessage {
    pub(crate) header: RtMsg,
    pub(crate) destination: Option<IpAddr>,
    pub(crate) gateway: Option<IpAddr>,
    pub(crate) oif: Option<u32>,
    pub(crate) priority: Option<u32>,
    pub(crate) table: Option<u32>,
    pub(crate) pref: Option<u8>,
}

impl RouteMessage {
    pub fn family(&self) -> u8 {
        self.header.rtm_family
    }

    pub fn dst_len(&self) -> u8 {
        self.header.rtm_dst_len
    }

    pub fn route_type(&self) -> RouteType {
        RouteType::from(self.header.rtm_type)
    }

    /// Table id; RTA_TABLE overrides the 8-bit header field.
    pub fn table_id(&self) -> u32 {
        self.table.unwrap_or(self.header.rtm_table as u32)
    }

    pub fn destination(&self) -> Option<IpAddr> {
        self.destination
    }

    pub fn gateway(&self) -> Option<IpAddr> {
        self.gateway
    }

    pub fn oif(&self) -> Option<u32> {
        self.oif
    }

    pub fn priority(&self) -> u32 {
        self.priority.unwrap_or(0)
    }

    pub fn pref(&self) -> u8 {
        self.pref.unwrap_or(0)
    }
}

impl FromNetlink for RouteMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(RtMsg::default().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, RtMsg::SIZE)?;
        let header = RtMsg::from_bytes(header_bytes).copied().unwrap_or_default();

        let mut msg = RouteMessage {
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let Ok((attr_type, data)) = parse_attr(input) else {
                break;
            };

            match attr_type {
                rta::DST => msg.destination = get::ip(data).ok(),
                rta::GATEWAY => msg.gateway = get::ip(data).ok(),
                rta::OIF => msg.oif = get::u32_ne(data).ok(),
                rta::PRIORITY => msg.priority = get::u32_ne(data).ok(),
                rta::TABLE => msg.table = get::u32_ne(data).ok(),
                rta::PREF => msg.pref = get::u8(data).ok(),
                _ => {}
            }
        }

        Ok(msg)
    }
}
