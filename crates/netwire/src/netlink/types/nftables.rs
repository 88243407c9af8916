//! nf_tables message header and attribute ids.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// NFNL_SUBSYS_NFTABLES.
pub const NFNL_SUBSYS_NFTABLES: u8 = 10;

/// NFT_MSG_* request types within the nf_tables subsystem.
pub mod nft_msg {
    pub const GETTABLE: u8 = 1;
    pub const GETCHAIN: u8 = 4;
    pub const GETRULE: u8 = 7;
}

/// Full netlink message type for an nf_tables request.
pub const fn nft_msg_type(msg: u8) -> u16 {
    ((NFNL_SUBSYS_NFTABLES as u16) << 8) | msg as u16
}

/// nfgenmsg, the header after nlmsghdr on every nfnetlink message.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NfGenMsg {
    pub nfgen_family: u8,
    pub version: u8,
    /// Big endian.
    pub res_id: u16,
}

impl NfGenMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn with_family(family: u8) -> Self {
        Self {
            nfgen_family: family,
            ..Default::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    pub fn from_bytes(data: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(data).map(|(r, _)| r).ok()
    }
}

/// NFTA_TABLE_*.
pub mod table {
    pub const NAME: u16 = 1;
}

/// NFTA_CHAIN_*.
pub mod chain {
    pub const TABLE: u16 = 1;
    pub const NAME: u16 = 3;
}

/// NFTA_RULE_*.
pub mod rule {
    pub const TABLE: u16 = 1;
    pub const CHAIN: u16 = 2;
    pub const HANDLE: u16 = 3;
    pub const EXPRESSIONS: u16 = 4;
}

/// NFTA_LIST_ELEM and NFTA_EXPR_*.
pub mod expr {
    pub const LIST_ELEM: u16 = 1;
    pub const NAME: u16 = 1;
    pub const DATA: u16 = 2;
}

/// NFTA_DATA_* and NFTA_VERDICT_*.
pub mod data {
    pub const VALUE: u16 = 1;
    pub const VERDICT: u16 = 2;
    pub const VERDICT_CODE: u16 = 1;
    pub const VERDICT_CHAIN: u16 = 2;
}

/// NFTA_CMP_*.
pub mod cmp {
    pub const SREG: u16 = 1;
    pub const OP: u16 = 2;
    pub const DATA: u16 = 3;
}

/// NFTA_PAYLOAD_*.
pub mod payload {
    pub const DREG: u16 = 1;
    pub const BASE: u16 = 2;
    pub const OFFSET: u16 = 3;
    pub const LEN: u16 = 4;
}

/// NFTA_META_*.
pub mod meta {
    pub const DREG: u16 = 1;
    pub const KEY: u16 = 2;
}

/// NFTA_IMMEDIATE_*.
pub mod immediate {
    pub const DREG: u16 = 1;
    pub const DATA: u16 = 2;
}

/// NFTA_NAT_*.
pub mod nat {
    pub const TYPE: u16 = 1;
    pub const FAMILY: u16 = 2;
    pub const REG_ADDR_MIN: u16 = 3;
    pub const REG_ADDR_MAX: u16 = 4;
    pub const REG_PROTO_MIN: u16 = 5;
    pub const REG_PROTO_MAX: u16 = 6;

    pub const DNAT: u32 = 1;
}

/// NFTA_RANGE_*.
pub mod range {
    pub const SREG: u16 = 1;
    pub const OP: u16 = 2;
    pub const FROM: u16 = 3;
    pub const TO: u16 = 4;
}

/// NFTA_MATCH_* / NFTA_TARGET_* (xtables compat).
pub mod xt {
    pub const NAME: u16 = 1;
    pub const REV: u16 = 2;
    pub const INFO: u16 = 3;
}

/// Verdict codes carried in immediate data.
pub mod verdict {
    pub const JUMP: i32 = -3;
    pub const GOTO: i32 = -4;
}
