//! Virtual network topology discovery for Linux hosts.
//!
//! netwire walks every network namespace of a host and builds a read-only
//! [`Topology`]: interfaces with their addresses and routes, the relations
//! between them (bridge ports, veth pairs across namespaces, macvlan, vlan
//! and vxlan masters, SR-IOV physical and virtual functions), open sockets
//! with their owning processes, and port forwarding rules together with the
//! namespace, interface and processes forwarded traffic ends up at.
//!
//! Discovery is read-only; nothing on the host is configured.
//!
//! # Features
//!
//! - `output` - `serde::Serialize` for the topology model
//! - `full` - All features enabled
//!
//! # Example
//!
//! ```ignore
//! use netwire::{Discovery, DiscoveryConfig, ProcInventory};
//! use netwire::portfwd::whereis::where_is;
//!
//! let topo = Discovery::new(DiscoveryConfig::default(), ProcInventory::new()).run()?;
//!
//! for ns in topo.namespaces.values() {
//!     for nif in ns.sorted_interfaces() {
//!         println!("{} {} {}", ns.id, nif.name, nif.kind);
//!     }
//!     for fp in ns.forwarded_ports() {
//!         println!("{} -> {:?}", fp.range, fp.destination_netns);
//!     }
//! }
//!
//! let host = *topo.namespaces.keys().next().unwrap();
//! println!("{:?}", where_is(&topo, host, &"10.0.0.5".parse()?));
//! ```

pub mod netlink;
pub mod topology;

pub mod discover;
pub mod inventory;
pub mod kind;
pub mod loader;
pub mod nsid;
pub mod portfwd;
pub mod relations;
pub mod sockets;
pub mod sriov;
pub mod tuntap;

pub use discover::{Discovery, DiscoveryConfig};
pub use inventory::{Inventory, NamespaceRef, ProcInventory, ProcessTable};
pub use netlink::{Error, Result};
pub use portfwd::{ForwardedPort, ForwardedPortRange, Recognizer};
pub use sockets::{ProcessSocket, Protocol as SocketProtocol, SimpleState, SocketState};
pub use topology::{
    Address, Family, Interface, InterfaceKind, NamespaceId, NetworkNamespace, NifRef, Route, SriovRole, Topology,
};
