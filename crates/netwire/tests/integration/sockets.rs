//! Socket discovery against a fake procfs.

use netwire::sockets::{self, InodeMap};
use netwire::{Family, NetworkNamespace, NifRef, SimpleState, SocketProtocol, SocketState};

use crate::common::{FakeRoot, NifBuilder, ip, sa, socket_row};

const LISTEN: u8 = 0x0a;
const ESTABLISHED: u8 = 0x01;
const UDP_CLOSE: u8 = 0x07;

/// Container namespace led by pid 42 with `lo` and `eth0` 10.0.0.5/24.
fn container(root: &FakeRoot) -> NetworkNamespace {
    let id = root.namespace("ctr");
    root.process(42, 1, "nginx", "ctr");
    root.process(43, 42, "nginx: worker", "ctr");

    let mut ns = NetworkNamespace::new(id, root.proc().join("42/ns/net"), vec![42]);
    ns.add_interface(NifBuilder::new(id, 1, "lo", "device").addr("127.0.0.1", 8).build());
    ns.add_interface(NifBuilder::new(id, 2, "eth0", "veth").addr("10.0.0.5", 24).build());
    ns
}

#[test]
fn test_dual_stack_listener_gets_ipv4_alias() {
    let root = FakeRoot::new("sockets-alias");
    let ns = container(&root);
    root.net_table(42, "tcp6", &[socket_row(0, sa("[::]:8080"), sa("[::]:0"), LISTEN, 1001)]);
    root.socket_fd(42, 3, 1001);
    root.socket_fd(43, 3, 1001);

    let inodes = InodeMap::scan(&root.proc());
    let (v4, v6) = sockets::discover(&ns, &root.proc(), &inodes);

    assert_eq!(v6.len(), 1);
    assert_eq!(v6[0].local_port, 8080);
    assert!(!v6[0].ipv4_mapped);

    assert_eq!(v4.len(), 1);
    let alias = &v4[0];
    assert!(alias.ipv4_mapped);
    assert_eq!(alias.family, Family::Ipv4);
    assert_eq!(alias.local_ip, ip("0.0.0.0"));
    assert_eq!(alias.local_port, 8080);
    assert_eq!(alias.simple_state, SimpleState::Listening);
    assert_eq!(alias.pids, vec![42, 43]);
    // bound to the unspecified address: every interface
    assert_eq!(alias.nifs.len(), 2);
}

#[test]
fn test_explicit_ipv4_socket_suppresses_alias() {
    let root = FakeRoot::new("sockets-explicit");
    let ns = container(&root);
    root.net_table(42, "tcp", &[socket_row(0, sa("0.0.0.0:8080"), sa("0.0.0.0:0"), LISTEN, 2001)]);
    root.net_table(42, "tcp6", &[socket_row(0, sa("[::]:8080"), sa("[::]:0"), LISTEN, 2002)]);

    let (v4, v6) = sockets::discover(&ns, &root.proc(), &InodeMap::scan(&root.proc()));

    assert_eq!(v4.len(), 1);
    assert!(!v4[0].ipv4_mapped);
    assert_eq!(v6.len(), 1);
}

#[test]
fn test_states_and_bound_interfaces() {
    let root = FakeRoot::new("sockets-states");
    let ns = container(&root);
    root.net_table(
        42,
        "tcp",
        &[
            socket_row(0, sa("10.0.0.5:80"), sa("0.0.0.0:0"), LISTEN, 3001),
            socket_row(1, sa("10.0.0.5:80"), sa("10.0.0.1:51234"), ESTABLISHED, 3002),
            "   2: garbage".to_string(),
        ],
    );
    root.net_table(
        42,
        "udp",
        &[
            socket_row(0, sa("127.0.0.1:53"), sa("0.0.0.0:0"), UDP_CLOSE, 3003),
            // udp in LISTEN is not a state udp sockets report
            socket_row(1, sa("127.0.0.1:54"), sa("0.0.0.0:0"), LISTEN, 3004),
        ],
    );
    root.socket_fd(43, 7, 3002);

    let (v4, v6) = sockets::discover(&ns, &root.proc(), &InodeMap::scan(&root.proc()));
    assert!(v6.is_empty());
    assert_eq!(v4.len(), 3);

    // sorted by local port, then protocol, listening first
    assert_eq!(v4[0].protocol, SocketProtocol::Udp);
    assert_eq!(v4[0].local_port, 53);
    assert_eq!(v4[0].simple_state, SimpleState::Listening);
    assert_eq!(v4[0].nifs, vec![NifRef::new(ns.id, 1)]);

    assert_eq!(v4[1].state, SocketState::Listen);
    assert_eq!(v4[1].nifs, vec![NifRef::new(ns.id, 2)]);
    assert!(v4[1].pids.is_empty());

    assert_eq!(v4[2].simple_state, SimpleState::Connected);
    assert_eq!(v4[2].remote_port, 51234);
    assert_eq!(v4[2].pids, vec![43]);
}

#[test]
fn test_namespace_without_leader_has_no_sockets() {
    let root = FakeRoot::new("sockets-noleader");
    let mut ns = container(&root);
    ns.pids.clear();
    root.net_table(42, "tcp", &[socket_row(0, sa("0.0.0.0:22"), sa("0.0.0.0:0"), LISTEN, 4001)]);

    let (v4, v6) = sockets::discover(&ns, &root.proc(), &InodeMap::scan(&root.proc()));
    assert!(v4.is_empty() && v6.is_empty());
}
