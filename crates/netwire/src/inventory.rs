//! Namespace inventory.
//!
//! Discovery does not detect namespaces itself; an [`Inventory`] hands it
//! the namespaces to inspect. [`ProcInventory`] is the procfs-based default:
//! every namespace some process is attached to, plus the named namespaces
//! bind-mounted under `/var/run/netns`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::netlink::Result;
use crate::netlink::namespace::{self, NETNS_RUN_DIR};
use crate::topology::NamespaceId;

/// A namespace to discover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRef {
    pub id: NamespaceId,
    /// Openable reference (`/proc/<pid>/ns/net` or a bind mount).
    pub path: PathBuf,
    /// Leader processes, smallest PID first. Empty for namespaces only held
    /// open by a bind mount.
    pub pids: Vec<u32>,
}

/// Source of the namespaces to discover.
pub trait Inventory: Send + Sync {
    fn namespaces(&self) -> Result<Vec<NamespaceRef>>;
}

impl Inventory for Vec<NamespaceRef> {
    fn namespaces(&self) -> Result<Vec<NamespaceRef>> {
        Ok(self.clone())
    }
}

/// A process as seen in procfs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    /// `None` if the namespace reference could not be read.
    pub netns: Option<NamespaceId>,
}

/// All processes of a procfs root, keyed by PID.
#[derive(Debug, Clone, Default)]
pub struct ProcessTable {
    pub processes: BTreeMap<u32, Process>,
}

impl ProcessTable {
    /// Scan `<proc>/<pid>/stat` and `<proc>/<pid>/ns/net` of every process.
    /// Processes that vanish or cannot be read are skipped.
    pub fn scan(proc_root: &Path) -> Result<Self> {
        let mut processes = BTreeMap::new();
        for pid in pids(proc_root)? {
            let dir = proc_root.join(pid.to_string());
            let Some((name, ppid)) = std::fs::read_to_string(dir.join("stat"))
                .ok()
                .as_deref()
                .and_then(parse_stat)
            else {
                tracing::trace!(pid, "unreadable stat");
                continue;
            };
            let netns = namespace::namespace_inode(dir.join("ns/net")).ok().map(NamespaceId);
            processes.insert(pid, Process { pid, ppid, name, netns });
        }
        Ok(Self { processes })
    }

    pub fn get(&self, pid: u32) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn netns_of(&self, pid: u32) -> Option<NamespaceId> {
        self.get(pid).and_then(|p| p.netns)
    }

    /// PID to process name.
    pub fn names(&self) -> BTreeMap<u32, String> {
        self.processes
            .values()
            .map(|p| (p.pid, p.name.clone()))
            .collect()
    }

    /// Processes whose parent lives in another namespace (or has none),
    /// grouped by namespace.
    pub fn leaders(&self) -> BTreeMap<NamespaceId, Vec<u32>> {
        let mut out: BTreeMap<NamespaceId, Vec<u32>> = BTreeMap::new();
        for p in self.processes.values() {
            let Some(netns) = p.netns else { continue };
            if self.netns_of(p.ppid) != Some(netns) {
                out.entry(netns).or_default().push(p.pid);
            }
        }
        out
    }
}

/// Numeric entries of a procfs root, ascending.
pub(crate) fn pids(proc_root: &Path) -> Result<Vec<u32>> {
    let mut pids: Vec<u32> = std::fs::read_dir(proc_root)?
        .flatten()
        .filter_map(|e| e.file_name().to_str()?.parse().ok())
        .collect();
    pids.sort_unstable();
    Ok(pids)
}

/// Name and parent PID from `<pid> (<comm>) <state> <ppid> ...`.
fn parse_stat(stat: &str) -> Option<(String, u32)> {
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let name = stat.get(open + 1..close)?.to_string();
    let mut rest = stat.get(close + 1..)?.split_whitespace();
    let _state = rest.next()?;
    let ppid = rest.next()?.parse().ok()?;
    Some((name, ppid))
}

/// Inventory backed by procfs and the named namespace directory.
#[derive(Debug, Clone)]
pub struct ProcInventory {
    proc_root: PathBuf,
    netns_dir: PathBuf,
}

impl Default for ProcInventory {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            netns_dir: PathBuf::from(NETNS_RUN_DIR),
        }
    }
}

impl ProcInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn proc_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_root = path.into();
        self
    }

    pub fn netns_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.netns_dir = path.into();
        self
    }
}

impl Inventory for ProcInventory {
    fn namespaces(&self) -> Result<Vec<NamespaceRef>> {
        let table = ProcessTable::scan(&self.proc_root)?;
        let mut found: BTreeMap<NamespaceId, NamespaceRef> = BTreeMap::new();

        for (id, pids) in table.leaders() {
            let path = self.proc_root.join(pids[0].to_string()).join("ns/net");
            found.insert(id, NamespaceRef { id, path, pids });
        }

        for (name, path) in namespace::list_named(&self.netns_dir)? {
            match namespace::namespace_inode(&path) {
                Ok(ino) => {
                    found.entry(NamespaceId(ino)).or_insert_with(|| NamespaceRef {
                        id: NamespaceId(ino),
                        path,
                        pids: Vec::new(),
                    });
                }
                Err(e) => tracing::debug!(name, "skipping named namespace: {e}"),
            }
        }

        Ok(found.into_values().collect())
    }
}
