//! winnow-based parsing of typed netlink payloads.
//!
//! Every decoded message implements [`FromNetlink`]: a parser over a byte
//! slice that advances past what it consumed, plus the fixed header a dump
//! request for that message type has to carry.

use winnow::binary::le_u16;
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take;

use super::error::{Error, Result};

/// Result type for winnow parsers.
pub type PResult<T> = core::result::Result<T, ErrMode<ContextError>>;

/// Types that can be parsed from netlink wire format.
pub trait FromNetlink: Sized {
    /// Parse from a mutable byte slice reference, advancing it.
    fn parse(input: &mut &[u8]) -> PResult<Self>;

    /// Parse from a complete payload.
    fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::parse
            .parse(data)
            .map_err(|e| Error::Parse(format!("{e}")))
    }

    /// Fixed header appended after the nlmsghdr of a dump request.
    fn write_dump_header(_buf: &mut Vec<u8>) {}
}

/// Hard parse failure.
pub fn cut<T>() -> PResult<T> {
    Err(ErrMode::Cut(ContextError::new()))
}

/// Take a fixed-size header of `size` bytes off the front of the input.
pub fn parse_header<'a>(input: &mut &'a [u8], size: usize) -> PResult<&'a [u8]> {
    if input.len() < size {
        return cut();
    }
    take(size).parse_next(input)
}

/// Parse one attribute and return (type without flags, payload).
pub fn parse_attr<'a>(input: &mut &'a [u8]) -> PResult<(u16, &'a [u8])> {
    let len = le_u16.parse_next(input)? as usize;
    let attr_type = le_u16.parse_next(input)?;

    if len < 4 || input.len() < len - 4 {
        return cut();
    }

    let payload: &[u8] = take(len - 4).parse_next(input)?;

    let padding = ((len + 3) & !3) - len;
    if input.len() >= padding {
        let _: &[u8] = take(padding).parse_next(input)?;
    } else {
        *input = &[];
    }

    Ok((attr_type & 0x3FFF, payload))
}

/// Parse attributes until the input is exhausted or malformed.
pub fn parse_attrs<'a>(input: &mut &'a [u8]) -> Vec<(u16, &'a [u8])> {
    let mut attrs = Vec::new();
    while input.len() >= 4 {
        match parse_attr(input) {
            Ok(attr) => attrs.push(attr),
            Err(_) => break,
        }
    }
    attrs
}

/// String from a null-terminated buffer; invalid UTF-8 yields "".
pub fn parse_string_from_bytes(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    std::str::from_utf8(&data[..end]).unwrap_or("").to_string()
}

/// Colon-separated lowercase hex, e.g. a MAC address.
pub fn format_hw_addr(addr: &[u8]) -> String {
    addr.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}
