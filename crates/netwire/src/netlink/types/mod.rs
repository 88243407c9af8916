//! Fixed-size netlink headers and attribute ids.

pub mod addr;
pub mod link;
pub mod nftables;
pub mod nsid;
pub mod route;
