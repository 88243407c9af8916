//! Topology discovery driver.
//!
//! Discovery runs in phases separated by join barriers:
//!
//! 1. per namespace, in parallel: links, addresses, routes, bus addresses
//!    and NSIDs ([`loader`], [`nsid`]);
//! 2. relations between interfaces ([`relations`]), then SR-IOV ([`sriov`]);
//! 3. the host process table, tun/tap processors ([`tuntap`]) and, per
//!    namespace in parallel, open sockets ([`sockets`]);
//! 4. per namespace in parallel, forwarded ports, then their destinations
//!    ([`portfwd`]).
//!
//! Each namespace worker runs on its own OS thread with a private
//! current-thread runtime, so namespace switches never leak into other
//! tasks. A failure in one namespace only drops that namespace's
//! contribution to the failing phase.
//!
//! ```ignore
//! use netwire::{Discovery, DiscoveryConfig, ProcInventory};
//!
//! let topo = Discovery::new(DiscoveryConfig::default(), ProcInventory::new()).run()?;
//! for ns in topo.namespaces.values() {
//!     println!("{} {} interfaces", ns.id, ns.interfaces.len());
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crate::inventory::{Inventory, NamespaceRef, ProcessTable};
use crate::netlink::namespace::namespace_inode;
use crate::netlink::{Protocol, Result};
use crate::portfwd::{self, ForwardedPort, Recognizer, whereis};
use crate::sockets::{self, InodeMap, ProcessSocket};
use crate::topology::{NamespaceId, NetworkNamespace, Topology};
use crate::{loader, nsid, relations, sriov, tuntap};

/// Discovery settings.
#[derive(Clone)]
pub struct DiscoveryConfig {
    pub proc_root: PathBuf,
    pub sysfs_root: PathBuf,
    /// Namespace the engine runs in; connections to it skip the namespace
    /// switch. Read from `<proc_root>/self/ns/net` unless set explicitly.
    pub self_netns: NamespaceId,
    self_netns_pinned: bool,
    pub recognizers: Vec<Arc<dyn Recognizer>>,
    pub sockets: bool,
    pub forwarded_ports: bool,
    pub sriov: bool,
    pub tuntap: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let proc_root = PathBuf::from("/proc");
        Self {
            self_netns: own_namespace(&proc_root),
            self_netns_pinned: false,
            proc_root,
            sysfs_root: PathBuf::from("/sys"),
            recognizers: portfwd::default_recognizers(),
            sockets: true,
            forwarded_ports: true,
            sriov: true,
            tuntap: true,
        }
    }
}

impl fmt::Debug for DiscoveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let recognizers: Vec<&str> = self.recognizers.iter().map(|r| r.name()).collect();
        f.debug_struct("DiscoveryConfig")
            .field("proc_root", &self.proc_root)
            .field("sysfs_root", &self.sysfs_root)
            .field("self_netns", &self.self_netns)
            .field("recognizers", &recognizers)
            .field("sockets", &self.sockets)
            .field("forwarded_ports", &self.forwarded_ports)
            .field("sriov", &self.sriov)
            .field("tuntap", &self.tuntap)
            .finish()
    }
}

/// Namespace of the calling process; `NamespaceId(0)` if unreadable, which
/// makes every namespace go through a switch.
fn own_namespace(proc_root: &Path) -> NamespaceId {
    match namespace_inode(proc_root.join("self/ns/net")) {
        Ok(ino) => NamespaceId(ino),
        Err(e) => {
            tracing::debug!("cannot identify own namespace: {e}");
            NamespaceId::default()
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another procfs mount. The own namespace is re-read from it
    /// unless it was set with [`Self::self_netns`].
    pub fn proc_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.proc_root = path.into();
        if !self.self_netns_pinned {
            self.self_netns = own_namespace(&self.proc_root);
        }
        self
    }

    pub fn sysfs_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.sysfs_root = path.into();
        self
    }

    pub fn self_netns(mut self, id: NamespaceId) -> Self {
        self.self_netns = id;
        self.self_netns_pinned = true;
        self
    }

    /// Replace the recognizers.
    pub fn recognizers(mut self, recognizers: Vec<Arc<dyn Recognizer>>) -> Self {
        self.recognizers = recognizers;
        self
    }

    /// Add a recognizer after the existing ones.
    pub fn recognizer(mut self, recognizer: Arc<dyn Recognizer>) -> Self {
        self.recognizers.push(recognizer);
        self
    }

    pub fn sockets(mut self, enabled: bool) -> Self {
        self.sockets = enabled;
        self
    }

    pub fn forwarded_ports(mut self, enabled: bool) -> Self {
        self.forwarded_ports = enabled;
        self
    }

    pub fn sriov(mut self, enabled: bool) -> Self {
        self.sriov = enabled;
        self
    }

    pub fn tuntap(mut self, enabled: bool) -> Self {
        self.tuntap = enabled;
        self
    }
}

/// Discovers the topology of the namespaces an [`Inventory`] supplies.
pub struct Discovery<I> {
    config: DiscoveryConfig,
    inventory: I,
}

impl<I: Inventory> Discovery<I> {
    pub fn new(config: DiscoveryConfig, inventory: I) -> Self {
        Self { config, inventory }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Run every phase and return the finished topology.
    ///
    /// Only a failing inventory is an error; everything else degrades to a
    /// partial topology with warnings logged.
    pub fn run(&self) -> Result<Topology> {
        let refs = self.inventory.namespaces()?;
        tracing::debug!(namespaces = refs.len(), "starting discovery");

        let mut topo = Topology::new();
        for netns in self.load_namespaces(&refs) {
            topo.insert(netns);
        }
        tracing::debug!(namespaces = topo.namespaces.len(), interfaces = topo.nif_count(), "namespaces loaded");

        relations::resolve(&mut topo);
        if self.config.sriov {
            sriov::resolve(&mut topo, &self.config.sysfs_root);
        }

        let processes = ProcessTable::scan(&self.config.proc_root).unwrap_or_else(|e| {
            tracing::warn!("cannot scan processes: {e}");
            ProcessTable::default()
        });
        topo.processes = processes.names();
        if self.config.tuntap {
            tuntap::resolve(&mut topo, &processes, &self.config.proc_root);
        }

        if self.config.sockets {
            self.discover_sockets(&mut topo);
        }

        if self.config.forwarded_ports {
            self.discover_forwarded_ports(&refs, &mut topo);
            whereis::resolve(&mut topo);
        }

        Ok(topo)
    }

    fn load_namespaces(&self, refs: &[NamespaceRef]) -> Vec<NetworkNamespace> {
        let self_netns = self.config.self_netns;
        let loaded = fan_out(refs, |ns| {
            block_on(async {
                let conn = loader::connect(Protocol::Route, ns, self_netns)?;
                let mut netns = loader::load(&conn, ns, self_netns).await?;
                nsid::resolve(&conn, &mut netns, refs).await;
                Ok(netns)
            })
        });

        refs.iter()
            .zip(loaded)
            .filter_map(|(ns, result)| match result {
                Some(Ok(netns)) => Some(netns),
                Some(Err(e)) if e.is_not_found() => {
                    tracing::debug!(netns = %ns.id, path = %ns.path.display(), "namespace vanished: {e}");
                    None
                }
                Some(Err(e)) => {
                    tracing::warn!(netns = %ns.id, path = %ns.path.display(), "skipping namespace: {e}");
                    None
                }
                None => {
                    tracing::warn!(netns = %ns.id, "namespace loader panicked");
                    None
                }
            })
            .collect()
    }

    fn discover_sockets(&self, topo: &mut Topology) {
        let inodes = InodeMap::scan(&self.config.proc_root);
        tracing::debug!(sockets = inodes.len(), "socket owners scanned");

        let found: Vec<(NamespaceId, Option<(Vec<ProcessSocket>, Vec<ProcessSocket>)>)> = {
            let namespaces: Vec<&NetworkNamespace> = topo.namespaces.values().collect();
            let sockets = fan_out(&namespaces, |ns| sockets::discover(ns, &self.config.proc_root, &inodes));
            namespaces.iter().map(|ns| ns.id).zip(sockets).collect()
        };

        for (id, sockets) in found {
            let Some((v4, v6)) = sockets else {
                tracing::warn!(netns = %id, "socket discovery panicked");
                continue;
            };
            if let Some(ns) = topo.netns_mut(id) {
                ns.sockets_v4 = v4;
                ns.sockets_v6 = v6;
            }
        }
    }

    fn discover_forwarded_ports(&self, refs: &[NamespaceRef], topo: &mut Topology) {
        let self_netns = self.config.self_netns;
        let recognizers = &self.config.recognizers;
        let loaded: Vec<&NamespaceRef> = refs.iter().filter(|ns| topo.netns(ns.id).is_some()).collect();

        let found = fan_out(&loaded, |ns| {
            block_on(async {
                let conn = loader::connect(Protocol::Netfilter, ns, self_netns)?;
                portfwd::discover(&conn, recognizers).await
            })
        });

        for (ns, result) in loaded.iter().zip(found) {
            let (v4, v6): (Vec<ForwardedPort>, Vec<ForwardedPort>) = match result {
                Some(Ok(ports)) => ports,
                Some(Err(e)) => {
                    tracing::warn!(netns = %ns.id, "cannot read nftables rules: {e}");
                    continue;
                }
                None => {
                    tracing::warn!(netns = %ns.id, "forwarded port discovery panicked");
                    continue;
                }
            };
            if let Some(netns) = topo.netns_mut(ns.id) {
                netns.forwarded_v4 = v4;
                netns.forwarded_v6 = v6;
            }
        }
    }
}

/// Run `work` on every item, one scoped thread each. Results are in item
/// order; `None` marks a worker that panicked.
fn fan_out<T, R, F>(items: &[T], work: F) -> Vec<Option<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let work = &work;
    thread::scope(|s| {
        let handles: Vec<_> = items.iter().map(|item| s.spawn(move || work(item))).collect();
        handles.into_iter().map(|h| h.join().ok()).collect()
    })
}

/// Drive `fut` to completion on a private current-thread runtime.
fn block_on<F, T>(fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_io().build()?;
    runtime.block_on(fut)
}
