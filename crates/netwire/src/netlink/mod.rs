//! Async netlink plumbing for read-only discovery.
//!
//! Covers the RTNETLINK dumps (links, addresses, routes), namespace id
//! queries and the nf_tables dumps that port-forward recognition needs.
//!
//! ```ignore
//! use netwire::netlink::{Connection, Protocol};
//!
//! let conn = Connection::new(Protocol::Route)?;
//! for link in conn.get_links().await? {
//!     println!("{}: {}", link.index(), link.name().unwrap_or("?"));
//! }
//! ```

pub mod attr;
mod builder;
pub mod connection;
mod error;
pub mod message;
pub mod messages;
pub mod namespace;
pub mod nftables;
pub mod parse;
mod socket;
pub mod types;

pub use attr::{AttrIter, NlAttr};
pub use builder::{MessageBuilder, NestToken};
pub use connection::Connection;
pub use error::{Error, Result};
pub use message::{MessageIter, NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
pub use parse::FromNetlink;
pub use socket::{NetlinkSocket, Protocol};
