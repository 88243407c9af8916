//! Netlink attribute (rtattr/nlattr) handling.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::error::{Error, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Netlink attribute alignment.
pub const NLA_ALIGNTO: usize = 4;

#[inline]
pub const fn nla_align(len: usize) -> usize {
    (len + NLA_ALIGNTO - 1) & !(NLA_ALIGNTO - 1)
}

/// Size of the attribute header.
pub const NLA_HDRLEN: usize = 4;

/// Netlink attribute header (mirrors struct nlattr / struct rtattr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlAttr {
    pub nla_len: u16,
    pub nla_type: u16,
}

pub const NLA_F_NESTED: u16 = 1 << 15;
pub const NLA_F_NET_BYTEORDER: u16 = 1 << 14;
pub const NLA_TYPE_MASK: u16 = !(NLA_F_NESTED | NLA_F_NET_BYTEORDER);

impl NlAttr {
    pub fn new(attr_type: u16, data_len: usize) -> Self {
        Self {
            nla_len: (NLA_HDRLEN + data_len) as u16,
            nla_type: attr_type,
        }
    }

    /// Attribute type without the nested/byteorder flags.
    pub fn kind(&self) -> u16 {
        self.nla_type & NLA_TYPE_MASK
    }

    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Iterator over the attributes of a payload. Stops at the first malformed
/// attribute.
pub struct AttrIter<'a> {
    data: &'a [u8],
}

impl<'a> AttrIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for AttrIter<'a> {
    /// (attribute type, payload)
    type Item = (u16, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let attr = NlAttr::from_bytes(self.data).ok()?;

        let len = attr.nla_len as usize;
        if len < NLA_HDRLEN || len > self.data.len() {
            self.data = &[];
            return None;
        }

        let payload = &self.data[NLA_HDRLEN..len];
        self.data = self.data.get(nla_align(len)..).unwrap_or(&[]);

        Some((attr.kind(), payload))
    }
}

/// Typed accessors for attribute payloads.
pub mod get {
    use super::*;

    pub fn u8(data: &[u8]) -> Result<u8> {
        data.first()
            .copied()
            .ok_or_else(|| Error::InvalidAttribute("empty u8 attribute".into()))
    }

    fn array<const N: usize>(data: &[u8], what: &str) -> Result<[u8; N]> {
        data.get(..N)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| Error::InvalidAttribute(format!("truncated {what} attribute")))
    }

    pub fn u16_ne(data: &[u8]) -> Result<u16> {
        array(data, "u16").map(u16::from_ne_bytes)
    }

    pub fn u16_be(data: &[u8]) -> Result<u16> {
        array(data, "u16").map(u16::from_be_bytes)
    }

    pub fn u32_ne(data: &[u8]) -> Result<u32> {
        array(data, "u32").map(u32::from_ne_bytes)
    }

    pub fn u32_be(data: &[u8]) -> Result<u32> {
        array(data, "u32").map(u32::from_be_bytes)
    }

    pub fn i32_ne(data: &[u8]) -> Result<i32> {
        array(data, "i32").map(i32::from_ne_bytes)
    }

    pub fn i32_be(data: &[u8]) -> Result<i32> {
        array(data, "i32").map(i32::from_be_bytes)
    }

    pub fn u64_be(data: &[u8]) -> Result<u64> {
        array(data, "u64").map(u64::from_be_bytes)
    }

    /// Null-terminated (or unterminated) string.
    pub fn string(data: &[u8]) -> Result<&str> {
        let len = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        std::str::from_utf8(&data[..len])
            .map_err(|e| Error::InvalidAttribute(format!("invalid UTF-8: {e}")))
    }

    /// IPv4 or IPv6 address, chosen by payload length.
    pub fn ip(data: &[u8]) -> Result<IpAddr> {
        match data.len() {
            4 => Ok(IpAddr::V4(Ipv4Addr::from(array::<4>(data, "ipv4")?))),
            16 => Ok(IpAddr::V6(Ipv6Addr::from(array::<16>(data, "ipv6")?))),
            n => Err(Error::InvalidAttribute(format!(
                "address attribute of {n} bytes"
            ))),
        }
    }
}
