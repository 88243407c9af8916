//! Socket inode ownership.

use std::collections::HashMap;
use std::path::Path;

use crate::inventory;

/// Socket inode to owning PIDs, built from every `/proc/<pid>/fd/*`.
#[derive(Debug, Clone, Default)]
pub struct InodeMap {
    owners: HashMap<u64, Vec<u32>>,
}

impl InodeMap {
    /// Scan all fd tables once. Processes whose fds cannot be read (gone,
    /// or not ours) are skipped.
    pub fn scan(proc_root: &Path) -> Self {
        let mut map = Self::default();
        let pids = match inventory::pids(proc_root) {
            Ok(pids) => pids,
            Err(e) => {
                tracing::warn!(proc = %proc_root.display(), "cannot list processes: {e}");
                return map;
            }
        };

        for pid in pids {
            let Ok(fds) = std::fs::read_dir(proc_root.join(pid.to_string()).join("fd")) else {
                continue;
            };
            for fd in fds.flatten() {
                let Ok(target) = std::fs::read_link(fd.path()) else {
                    continue;
                };
                if let Some(inode) = target.to_str().and_then(parse_socket_inode) {
                    map.insert(inode, pid);
                }
            }
        }
        tracing::debug!(sockets = map.owners.len(), "socket inodes mapped");
        map
    }

    pub fn insert(&mut self, inode: u64, pid: u32) {
        let pids = self.owners.entry(inode).or_default();
        if !pids.contains(&pid) {
            pids.push(pid);
        }
    }

    pub fn owners(&self, inode: u64) -> &[u32] {
        self.owners.get(&inode).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

/// Inode of a `socket:[<inode>]` link target.
pub fn parse_socket_inode(link: &str) -> Option<u64> {
    link.strip_prefix("socket:[")?.strip_suffix(']')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_link_targets() {
        assert_eq!(parse_socket_inode("socket:[12345]"), Some(12345));
        assert_eq!(parse_socket_inode("pipe:[12345]"), None);
        assert_eq!(parse_socket_inode("anon_inode:[eventpoll]"), None);
        assert_eq!(parse_socket_inode("socket:12345"), None);
    }

    #[test]
    fn shared_sockets_keep_all_owners() {
        let mut map = InodeMap::default();
        map.insert(7, 100);
        map.insert(7, 101);
        map.insert(7, 100);
        assert_eq!(map.owners(7), &[100, 101]);
        assert!(map.owners(8).is_empty());
        assert_eq!(map.len(), 1);
    }
}
