//! Common test utilities for integration tests.
//!
//! Provides `FakeRoot`, a scratch directory holding fake procfs and sysfs
//! trees, plus builders for in-memory topologies.

#![allow(dead_code)]

use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use netwire::topology::LinkHints;
use netwire::{Address, Interface, InterfaceKind, NamespaceId, NifRef};

/// Global counter for unique scratch directories.
static ROOT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// A scratch directory with `proc/` and `sys/` below it, removed on drop.
pub struct FakeRoot {
    root: PathBuf,
}

impl FakeRoot {
    pub fn new(prefix: &str) -> Self {
        let id = ROOT_COUNTER.fetch_add(1, Ordering::SeqCst);
        let root = std::env::temp_dir().join(format!("netwire-test-{}-{}-{}", prefix, std::process::id(), id));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("proc")).unwrap();
        fs::create_dir_all(root.join("sys/bus/pci/devices")).unwrap();
        fs::create_dir_all(root.join("nsfs")).unwrap();
        fs::create_dir_all(root.join("netns")).unwrap();
        Self { root }
    }

    pub fn proc(&self) -> PathBuf {
        self.root.join("proc")
    }

    pub fn sys(&self) -> PathBuf {
        self.root.join("sys")
    }

    pub fn netns_dir(&self) -> PathBuf {
        self.root.join("netns")
    }

    /// A stand-in namespace file; its inode is the namespace id.
    pub fn namespace(&self, name: &str) -> NamespaceId {
        let path = self.nsfs(name);
        if !path.exists() {
            fs::write(&path, name).unwrap();
        }
        NamespaceId(inode(&path))
    }

    fn nsfs(&self, name: &str) -> PathBuf {
        self.root.join("nsfs").join(name)
    }

    /// Bind a named namespace, like `ip netns add`.
    pub fn named(&self, name: &str, namespace: &str) -> NamespaceId {
        let id = self.namespace(namespace);
        symlink(self.nsfs(namespace), self.netns_dir().join(name)).unwrap();
        id
    }

    /// A process `pid` in `namespace` with parent `ppid`.
    pub fn process(&self, pid: u32, ppid: u32, comm: &str, namespace: &str) -> PathBuf {
        self.namespace(namespace);
        let dir = self.proc().join(pid.to_string());
        fs::create_dir_all(dir.join("ns")).unwrap();
        fs::create_dir_all(dir.join("fd")).unwrap();
        fs::create_dir_all(dir.join("fdinfo")).unwrap();
        fs::create_dir_all(dir.join("net")).unwrap();
        fs::write(dir.join("stat"), format!("{pid} ({comm}) S {ppid} {pid} {pid} 0 -1 4194560")).unwrap();
        symlink(self.nsfs(namespace), dir.join("ns/net")).unwrap();
        dir
    }

    /// Open socket fd `fd` of `pid` pointing at socket `inode`.
    pub fn socket_fd(&self, pid: u32, fd: u32, inode: u64) {
        let link = self.proc().join(pid.to_string()).join("fd").join(fd.to_string());
        symlink(format!("socket:[{inode}]"), link).unwrap();
    }

    /// Write `/proc/<pid>/net/<table>` with the given rows.
    pub fn net_table(&self, pid: u32, table: &str, rows: &[String]) {
        let mut content =
            String::from("  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(self.proc().join(pid.to_string()).join("net").join(table), content).unwrap();
    }

    /// fdinfo of a tun fd attached to `ifname`.
    pub fn tun_fd(&self, pid: u32, fd: u32, ifname: &str) {
        let path = self.proc().join(pid.to_string()).join("fdinfo").join(fd.to_string());
        fs::write(path, format!("pos:\t0\nflags:\t02\nmnt_id:\t15\niff:\t{ifname}\n")).unwrap();
    }

    /// A PCI device directory without SR-IOV markers.
    pub fn pci_device(&self, bus: &str) -> PathBuf {
        let dir = self.sys().join("bus/pci/devices").join(bus);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// An SR-IOV capable physical function.
    pub fn physical_function(&self, bus: &str, numvfs: u32) {
        fs::write(self.pci_device(bus).join("sriov_numvfs"), numvfs.to_string()).unwrap();
    }

    /// A virtual function of `pf`.
    pub fn virtual_function(&self, bus: &str, pf: &str) {
        symlink(format!("../{pf}"), self.pci_device(bus).join("physfn")).unwrap();
    }
}

impl Drop for FakeRoot {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn inode(path: &Path) -> u64 {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).unwrap().ino()
}

/// One `/proc/net/{tcp,udp}{,6}` row as the kernel prints it on this host.
pub fn socket_row(slot: u32, local: SocketAddr, remote: SocketAddr, state: u8, inode: u64) -> String {
    format!(
        "{slot:4}: {}:{:04X} {}:{:04X} {state:02X} 00000000:00000000 00:00000000 00000000  1000        0 {inode} 1 0000000000000000",
        hex_ip(&local.ip()),
        local.port(),
        hex_ip(&remote.ip()),
        remote.port(),
    )
}

/// Address as 32-bit words in host byte order.
fn hex_ip(ip: &IpAddr) -> String {
    let octets = match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    octets
        .chunks(4)
        .map(|w| format!("{:08X}", u32::from_ne_bytes([w[0], w[1], w[2], w[3]])))
        .collect()
}

pub fn sa(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Builder for interfaces of hand-made topologies.
pub struct NifBuilder {
    nif: Interface,
}

impl NifBuilder {
    pub fn new(netns: NamespaceId, index: u32, name: &str, kind: &str) -> Self {
        let details = match kind {
            "bridge" => InterfaceKind::Bridge { ports: Vec::new() },
            "veth" => InterfaceKind::Veth { peer: None },
            _ => InterfaceKind::Generic,
        };
        Self {
            nif: Interface {
                netns,
                index,
                name: name.into(),
                kind: kind.into(),
                loopback: name == "lo",
                details,
                ..Default::default()
            },
        }
    }

    pub fn addr(mut self, ip: &str, prefix: u8) -> Self {
        let index = self.nif.index;
        self.nif.push_address(Address::new(ip.parse().unwrap(), prefix, index));
        self
    }

    pub fn master(mut self, index: u32) -> Self {
        self.nif.hints.master = Some(index);
        self
    }

    /// `IFLA_LINK` / `IFLA_LINK_NETNSID` as the kernel reports them.
    pub fn link(mut self, link: Option<u32>, nsid: Option<u32>) -> Self {
        self.nif.hints = LinkHints {
            link,
            link_nsid: nsid,
            ..self.nif.hints
        };
        self
    }

    pub fn bus(mut self, bus: &str) -> Self {
        self.nif.physical = true;
        self.nif.bus_addr = Some(bus.into());
        self
    }

    pub fn peer(mut self, peer: NifRef) -> Self {
        self.nif.details = InterfaceKind::Veth { peer: Some(peer) };
        self
    }

    pub fn build(self) -> Interface {
        self.nif
    }
}
