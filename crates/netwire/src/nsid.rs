//! NSID discovery.
//!
//! An NSID is a namespace-local alias for a peer namespace. Link attributes
//! such as `IFLA_LINK_NETNSID` are only meaningful in the namespace that
//! reported them, so every namespace gets its own map.

use std::os::fd::AsRawFd;

use crate::inventory::NamespaceRef;
use crate::netlink::Connection;
use crate::netlink::namespace;
use crate::topology::NetworkNamespace;

/// Query the NSID `netns` assigned to each peer and record the assigned ones.
///
/// `conn` must be a route connection living in `netns`. Failures only drop
/// the affected peer.
pub async fn resolve(conn: &Connection, netns: &mut NetworkNamespace, peers: &[NamespaceRef]) {
    let own = netns.id;
    for peer in peers.iter().filter(|p| p.id != own) {
        let fd = match namespace::open_path(&peer.path) {
            Ok(fd) => fd,
            Err(e) => {
                tracing::debug!(netns = %netns.id, peer = %peer.id, "cannot open peer: {e}");
                continue;
            }
        };

        match conn.get_nsid(fd.as_raw_fd()).await {
            Ok(Some(nsid)) => {
                tracing::trace!(netns = %netns.id, peer = %peer.id, nsid, "nsid");
                netns.set_nsid(nsid, peer.id);
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(netns = %netns.id, peer = %peer.id, "nsid query failed: {e}"),
        }
    }
}
