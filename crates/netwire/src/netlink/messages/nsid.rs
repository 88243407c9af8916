//! Namespace id message parsing (RTM_NEWNSID).

use crate::netlink::attr::AttrIter;
use crate::netlink::types::nsid::{RtGenMsg, netnsa};

/// Parsed RTM_NEWNSID reply.
#[derive(Debug, Clone, Default)]
pub struct NsIdMessage {
    pub family: u8,
    /// Raw NETNSA_NSID; negative means no id is assigned.
    pub nsid: Option<i32>,
    pub pid: Option<u32>,
}

impl NsIdMessage {
    /// Parse the payload after the netlink header: rtgenmsg padded to four
    /// bytes, then attributes.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let family = *data.first()?;
        let attrs = data.get(RtGenMsg::padded_size()..)?;

        let mut msg = NsIdMessage {
            family,
            ..Default::default()
        };

        for (attr_type, payload) in AttrIter::new(attrs) {
            let Some(raw) = payload.get(..4).and_then(|b| <[u8; 4]>::try_from(b).ok()) else {
                continue;
            };
            match attr_type {
                netnsa::NSID => msg.nsid = Some(i32::from_ne_bytes(raw)),
                netnsa::PID => msg.pid = Some(u32::from_ne_bytes(raw)),
                _ => {}
            }
        }

        Some(msg)
    }

    /// The assigned id, if any.
    pub fn assigned(&self) -> Option<u32> {
        self.nsid.and_then(|id| u32::try_from(id).ok())
    }
}
