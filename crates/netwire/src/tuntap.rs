//! Processes serving TUN/TAP interfaces.
//!
//! A process holding a tun fd shows the attached interface in the fd's
//! fdinfo as `iff:\t<name>`. The name alone is ambiguous across namespaces,
//! and the device may live in a namespace other than the process's own
//! (a VMM serving a tap that was moved into a guest namespace). The
//! device's namespace is asked from the kernel by duplicating the fd with
//! `pidfd_getfd(2)` and issuing `TUNGETDEVNETNS` on the copy.

use std::collections::BTreeSet;
use std::fs::File;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use crate::inventory::ProcessTable;
use crate::topology::{InterfaceKind, NamespaceId, Topology};

/// `_IO('T', 227)`: returns an fd of the namespace a tun device is in.
const TUNGETDEVNETNS: libc::c_ulong = 0x54e3;

/// Interface name from the `iff:` line of an fdinfo file.
fn attached_interface(fdinfo: &str) -> Option<&str> {
    fdinfo
        .lines()
        .find_map(|line| line.strip_prefix("iff:"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn owned(fd: libc::c_long) -> Option<OwnedFd> {
    if fd < 0 {
        return None;
    }
    // SAFETY: `fd` was just returned by the kernel and is owned by nobody else.
    Some(unsafe { OwnedFd::from_raw_fd(fd as RawFd) })
}

/// Namespace of the tun/tap device behind fd `fd` of process `pid`.
///
/// Needs ptrace access to the process; `None` on any failure.
pub fn device_netns(pid: u32, fd: u32) -> Option<NamespaceId> {
    // SAFETY: the syscalls take plain integers; returned fds are wrapped at once.
    let pidfd = owned(unsafe { libc::syscall(libc::SYS_pidfd_open, pid as libc::pid_t, 0) })?;
    let tunfd = owned(unsafe { libc::syscall(libc::SYS_pidfd_getfd, pidfd.as_raw_fd(), fd as libc::c_int, 0) })?;
    // SAFETY: TUNGETDEVNETNS takes no argument; non-tun fds fail with ENOTTY/EINVAL.
    let nsfd = owned(unsafe { libc::ioctl(tunfd.as_raw_fd(), TUNGETDEVNETNS as _) } as libc::c_long)?;
    let ino = File::from(nsfd).metadata().ok()?.ino();
    Some(NamespaceId(ino))
}

/// Attach serving processes to the tun/tap interfaces of every namespace.
pub fn resolve(topo: &mut Topology, processes: &ProcessTable, proc_root: &Path) {
    resolve_with(topo, processes, proc_root, device_netns);
}

/// Like [`resolve`], with `lookup` finding the namespace of a device from
/// (pid, fd). Where it fails the process's own namespace is assumed.
pub fn resolve_with<F>(topo: &mut Topology, processes: &ProcessTable, proc_root: &Path, lookup: F)
where
    F: Fn(u32, u32) -> Option<NamespaceId>,
{
    let names: BTreeSet<String> = topo
        .namespaces
        .values()
        .flat_map(|ns| ns.interfaces.values())
        .filter(|nif| matches!(nif.details, InterfaceKind::TunTap { .. }))
        .map(|nif| nif.name.clone())
        .collect();
    if names.is_empty() {
        return;
    }

    for process in processes.processes.values() {
        let dir = proc_root.join(process.pid.to_string()).join("fdinfo");
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let Some(fd) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
                continue;
            };
            let Ok(info) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            let Some(name) = attached_interface(&info).filter(|n| names.contains(*n)) else {
                continue;
            };

            let Some(netns) = lookup(process.pid, fd).or(process.netns) else {
                continue;
            };
            let Some(ns) = topo.netns_mut(netns) else {
                tracing::warn!(pid = process.pid, name, %netns, "tun/tap served in unknown namespace");
                continue;
            };
            let Some(&index) = ns.names.get(name) else { continue };
            match ns.interfaces.get_mut(&index).map(|nif| &mut nif.details) {
                Some(InterfaceKind::TunTap { processors, .. }) => {
                    if !processors.contains(&process.pid) {
                        processors.push(process.pid);
                    }
                }
                Some(_) => tracing::warn!(pid = process.pid, name, %netns, "fd names a non tun/tap interface"),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_iff_line() {
        let info = "pos:\t0\nflags:\t0104002\nmnt_id:\t25\nino:\t1043\niff:\ttap0\n";
        assert_eq!(attached_interface(info), Some("tap0"));
        assert_eq!(attached_interface("pos:\t0\nflags:\t02\n"), None);
    }

    #[test]
    fn non_tun_fd_has_no_device_namespace() {
        // stdin of this process is never a tun device
        assert_eq!(device_netns(std::process::id(), 0), None);
        assert_eq!(device_netns(u32::MAX, 0), None);
    }
}
