//! Link header, attribute ids and link-kind constants.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Interface info message (struct ifinfomsg).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct IfInfoMsg {
    pub ifi_family: u8,
    pub __ifi_pad: u8,
    /// Device type (ARPHRD_*).
    pub ifi_type: u16,
    pub ifi_index: i32,
    /// Device flags (IFF_*).
    pub ifi_flags: u32,
    pub ifi_change: u32,
}

impl IfInfoMsg {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    pub fn from_bytes(data: &[u8]) -> Option<&Self> {
        Self::ref_from_prefix(data).map(|(r, _)| r).ok()
    }
}

pub const IFF_LOOPBACK: u32 = 0x8;
pub const IFF_PROMISC: u32 = 0x100;

/// IFLA_* attribute ids.
pub mod ifla {
    pub const ADDRESS: u16 = 1;
    pub const IFNAME: u16 = 3;
    pub const MTU: u16 = 4;
    pub const LINK: u16 = 5;
    pub const MASTER: u16 = 10;
    pub const OPERSTATE: u16 = 16;
    pub const LINKINFO: u16 = 18;
    pub const IFALIAS: u16 = 20;
    pub const PROMISCUITY: u16 = 30;
    pub const LINK_NETNSID: u16 = 37;
}

/// Nested IFLA_INFO_* ids.
pub mod info {
    pub const KIND: u16 = 1;
    pub const DATA: u16 = 2;
}

/// IFLA_VLAN_* ids.
pub mod vlan {
    pub const ID: u16 = 1;
    pub const PROTOCOL: u16 = 5;
}

/// IFLA_MACVLAN_* ids.
pub mod macvlan {
    pub const MODE: u16 = 1;
}

/// IFLA_TUN_* ids.
pub mod tun {
    pub const TYPE: u16 = 1;
}

/// IFLA_VXLAN_* ids.
pub mod vxlan {
    pub const ID: u16 = 1;
    pub const GROUP: u16 = 2;
    pub const LINK: u16 = 3;
    pub const LOCAL: u16 = 4;
    pub const TTL: u16 = 5;
    pub const TOS: u16 = 6;
    pub const PORT_RANGE: u16 = 10;
    pub const PROXY: u16 = 11;
    pub const PORT: u16 = 15;
    pub const GROUP6: u16 = 16;
    pub const LOCAL6: u16 = 17;
}

/// RFC 2863 operational state (IFLA_OPERSTATE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
#[repr(u8)]
pub enum OperState {
    #[default]
    Unknown = 0,
    NotPresent = 1,
    Down = 2,
    LowerLayerDown = 3,
    Testing = 4,
    Dormant = 5,
    Up = 6,
}

impl From<u8> for OperState {
    fn from(val: u8) -> Self {
        match val {
            1 => Self::NotPresent,
            2 => Self::Down,
            3 => Self::LowerLayerDown,
            4 => Self::Testing,
            5 => Self::Dormant,
            6 => Self::Up,
            _ => Self::Unknown,
        }
    }
}

impl OperState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::NotPresent => "notpresent",
            Self::Down => "down",
            Self::LowerLayerDown => "lowerlayerdown",
            Self::Testing => "testing",
            Self::Dormant => "dormant",
            Self::Up => "up",
        }
    }
}

impl std::fmt::Display for OperState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Macvlan/macvtap forwarding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
pub enum MacvlanMode {
    Private,
    Vepa,
    Bridge,
    Passthru,
    Source,
    Unknown(u32),
}

impl From<u32> for MacvlanMode {
    fn from(val: u32) -> Self {
        match val {
            1 => Self::Private,
            2 => Self::Vepa,
            4 => Self::Bridge,
            8 => Self::Passthru,
            16 => Self::Source,
            other => Self::Unknown(other),
        }
    }
}

impl std::fmt::Display for MacvlanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Private => f.write_str("private"),
            Self::Vepa => f.write_str("vepa"),
            Self::Bridge => f.write_str("bridge"),
            Self::Passthru => f.write_str("passthru"),
            Self::Source => f.write_str("source"),
            Self::Unknown(v) => write!(f, "unknown({v})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size() {
        assert_eq!(IfInfoMsg::SIZE, 16);
    }

    #[test]
    fn state_names() {
        assert_eq!(OperState::from(6).to_string(), "up");
        assert_eq!(OperState::from(3).to_string(), "lowerlayerdown");
        assert_eq!(OperState::from(42), OperState::Unknown);
        assert_eq!(MacvlanMode::from(4).to_string(), "bridge");
        assert_eq!(MacvlanMode::from(3).to_string(), "unknown(3)");
    }
}
