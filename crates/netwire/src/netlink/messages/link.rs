//! Strongly-typed link message.

use crate::netlink::parse::{FromNetlink, PResult, parse_attr, parse_header, parse_string_from_bytes};
use crate::netlink::types::link::{IFF_LOOPBACK, IfInfoMsg, OperState, ifla, info};

/// Link message with the attributes discovery needs.
#[derive(Debug, Clone, Default)]
pub struct LinkMessage {
    pub(crate) header: IfInfoMsg,
    pub(crate) name: Option<String>,
    pub(crate) alias: Option<String>,
    pub(crate) address: Option<Vec<u8>>,
    pub(crate) mtu: Option<u32>,
    /// IFLA_LINK: parent or peer index, possibly in another namespace.
    pub(crate) link: Option<u32>,
    pub(crate) master: Option<u32>,
    pub(crate) operstate: Option<OperState>,
    pub(crate) promiscuity: Option<u32>,
    /// IFLA_LINK_NETNSID: namespace of `link`, as seen from this namespace.
    pub(crate) link_netnsid: Option<i32>,
    /// IFLA_INFO_KIND.
    pub(crate) kind: Option<String>,
    /// Raw IFLA_INFO_DATA, decoded by the kind registry.
    pub(crate) info_data: Option<Vec<u8>>,
}

impl LinkMessage {
    pub fn index(&self) -> u32 {
        self.header.ifi_index as u32
    }

    pub fn flags(&self) -> u32 {
        self.header.ifi_flags
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn address(&self) -> Option<&[u8]> {
        self.address.as_deref()
    }

    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }

    pub fn link(&self) -> Option<u32> {
        self.link
    }

    pub fn master(&self) -> Option<u32> {
        self.master
    }

    pub fn operstate(&self) -> OperState {
        self.operstate.unwrap_or_default()
    }

    pub fn promiscuity(&self) -> u32 {
        self.promiscuity.unwrap_or(0)
    }

    /// Link NSID if the kernel reported an assigned (non-negative) one.
    pub fn link_netnsid(&self) -> Option<u32> {
        self.link_netnsid.and_then(|id| u32::try_from(id).ok())
    }

    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn info_data(&self) -> Option<&[u8]> {
        self.info_data.as_deref()
    }

    pub fn is_loopback(&self) -> bool {
        self.header.ifi_flags & IFF_LOOPBACK != 0
    }

    fn parse_linkinfo(&mut self, mut data: &[u8]) {
        while data.len() >= 4 {
            let Ok((attr_type, payload)) = parse_attr(&mut data) else {
                break;
            };
            match attr_type {
                info::KIND => self.kind = Some(parse_string_from_bytes(payload)),
                info::DATA => self.info_data = Some(payload.to_vec()),
                _ => {}
            }
        }
    }
}

fn u32_of(data: &[u8]) -> Option<u32> {
    Some(u32::from_ne_bytes(data.get(..4)?.try_into().ok()?))
}

impl FromNetlink for LinkMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfInfoMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let header_bytes = parse_header(input, IfInfoMsg::SIZE)?;
        let header = IfInfoMsg::from_bytes(header_bytes)
            .copied()
            .unwrap_or_default();

        let mut msg = LinkMessage {
            header,
            ..Default::default()
        };

        while input.len() >= 4 {
            let Ok((attr_type, data)) = parse_attr(input) else {
                break;
            };

            match attr_type {
                ifla::IFNAME => msg.name = Some(parse_string_from_bytes(data)),
                ifla::IFALIAS => msg.alias = Some(parse_string_from_bytes(data)),
                ifla::ADDRESS => msg.address = Some(data.to_vec()),
                ifla::MTU => msg.mtu = u32_of(data),
                ifla::LINK => msg.link = u32_of(data),
                ifla::MASTER => msg.master = u32_of(data),
                ifla::OPERSTATE => msg.operstate = data.first().map(|&s| OperState::from(s)),
                ifla::PROMISCUITY => msg.promiscuity = u32_of(data),
                ifla::LINK_NETNSID => msg.link_netnsid = u32_of(data).map(|v| v as i32),
                ifla::LINKINFO => msg.parse_linkinfo(data),
                _ => {}
            }
        }

        Ok(msg)
    }
}
