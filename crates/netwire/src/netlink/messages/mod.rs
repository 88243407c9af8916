//! Decoded netlink messages.

pub mod address;
pub mod link;
pub mod nftables;
pub mod nsid;
pub mod route;

pub use address::AddressMessage;
pub use link::LinkMessage;
pub use nftables::{ChainMessage, RuleMessage, TableMessage};
pub use nsid::NsIdMessage;
pub use route::RouteMessage;
