//! Namespace id message header and attributes.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// NETNSA_* attribute ids.
pub mod netnsa {
    pub const NSID: u16 = 1;
    pub const PID: u16 = 2;
    pub const FD: u16 = 3;
}

/// rtgenmsg, the one-byte family header of RTM_*NSID messages.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct RtGenMsg {
    pub rtgen_family: u8,
}

impl RtGenMsg {
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Size on the wire including alignment padding.
    pub const fn padded_size() -> usize {
        4
    }
}
