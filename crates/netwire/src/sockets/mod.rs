//! Open transport sockets and the processes owning them.
//!
//! Socket tables are read from `/proc/<leader>/net/{tcp,udp}{,6}` of a
//! namespace's leader process. Ownership comes from a single host-wide scan
//! of every process's fd table ([`InodeMap`]).

mod correlate;
mod inodes;
mod procnet;

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

pub use correlate::{AddressIndex, correlate, discover};
pub use inodes::{InodeMap, parse_socket_inode};
pub use procnet::{SocketRecord, parse_table, read_table};

use crate::topology::{Family, NifRef, exploded};

/// Transport protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }

    /// IANA protocol number.
    pub fn number(&self) -> u8 {
        match self {
            Self::Tcp => 6,
            Self::Udp => 17,
        }
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            6 => Some(Self::Tcp),
            17 => Some(Self::Udp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel socket state (`include/net/tcp_states.h`), also used for UDP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "kebab-case"))]
pub enum SocketState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    NewSynRecv,
}

impl SocketState {
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => Self::Established,
            0x02 => Self::SynSent,
            0x03 => Self::SynRecv,
            0x04 => Self::FinWait1,
            0x05 => Self::FinWait2,
            0x06 => Self::TimeWait,
            0x07 => Self::Close,
            0x08 => Self::CloseWait,
            0x09 => Self::LastAck,
            0x0a => Self::Listen,
            0x0b => Self::Closing,
            0x0c => Self::NewSynRecv,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Established => "established",
            Self::SynSent => "syn-sent",
            Self::SynRecv => "syn-recv",
            Self::FinWait1 => "fin-wait-1",
            Self::FinWait2 => "fin-wait-2",
            Self::TimeWait => "time-wait",
            Self::Close => "close",
            Self::CloseWait => "close-wait",
            Self::LastAck => "last-ack",
            Self::Listen => "listen",
            Self::Closing => "closing",
            Self::NewSynRecv => "new-syn-recv",
        }
    }

    /// Simplified state, or `None` for states that are not reported.
    pub fn simple(&self, protocol: Protocol) -> Option<SimpleState> {
        match protocol {
            Protocol::Tcp => Some(match self {
                Self::Listen => SimpleState::Listening,
                Self::Established | Self::FinWait1 | Self::FinWait2 => SimpleState::Connected,
                _ => SimpleState::Unconnected,
            }),
            Protocol::Udp => match self {
                Self::Close => Some(SimpleState::Listening),
                Self::Established => Some(SimpleState::Connected),
                _ => None,
            },
        }
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declaration order is sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
pub enum SimpleState {
    Listening,
    Connected,
    Unconnected,
}

/// An open socket with its owners and the interfaces it is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct ProcessSocket {
    pub family: Family,
    pub protocol: Protocol,
    pub local_ip: IpAddr,
    pub local_port: u16,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    pub state: SocketState,
    pub simple_state: SimpleState,
    pub pids: Vec<u32>,
    /// IPv4 view of a dual-stack IPv6 socket.
    pub ipv4_mapped: bool,
    pub nifs: Vec<NifRef>,
}

impl ProcessSocket {
    pub fn is_listening(&self) -> bool {
        self.simple_state == SimpleState::Listening
    }

    /// Sort order of socket listings.
    pub fn listing_order(&self, other: &Self) -> Ordering {
        self.local_port
            .cmp(&other.local_port)
            .then(self.protocol.cmp(&other.protocol))
            .then(self.simple_state.cmp(&other.simple_state))
            .then(self.family.cmp(&other.family))
            .then_with(|| exploded(&self.local_ip).cmp(&exploded(&other.local_ip)))
            .then_with(|| exploded(&self.remote_ip).cmp(&exploded(&other.remote_ip)))
            .then(self.remote_port.cmp(&other.remote_port))
    }
}
