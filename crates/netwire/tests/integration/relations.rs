//! Relation resolution across namespaces.

use netwire::{Address, InterfaceKind, NamespaceId, NetworkNamespace, NifRef, Topology, relations};

use crate::common::{NifBuilder, ip};

const HOST: NamespaceId = NamespaceId(4026531840);
const CTR: NamespaceId = NamespaceId(4026532301);

fn peer_of(topo: &Topology, nif: NifRef) -> Option<NifRef> {
    topo.nif(&nif).and_then(|n| n.details.peer()).copied()
}

#[test]
fn test_veth_pair_across_namespaces() {
    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 7, "veth0a1b2c", "veth").link(Some(2), Some(0)).build());
    host.set_nsid(0, CTR);

    let mut ctr = NetworkNamespace::new(CTR, "/proc/42/ns/net", vec![42]);
    ctr.add_interface(NifBuilder::new(CTR, 2, "eth0", "veth").link(Some(7), Some(1)).build());
    ctr.set_nsid(1, HOST);

    let mut topo = Topology::new();
    topo.insert(host);
    topo.insert(ctr);
    relations::resolve(&mut topo);

    let a = NifRef::new(HOST, 7);
    let b = NifRef::new(CTR, 2);
    assert_eq!(peer_of(&topo, a), Some(b));
    assert_eq!(peer_of(&topo, b), Some(a));
    assert_eq!(relations::linked_namespaces(&topo, HOST), vec![CTR]);
}

#[test]
fn test_veth_with_suppressed_link_index() {
    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 5, "vhost", "veth").link(None, Some(3)).build());
    host.set_nsid(3, CTR);

    let mut ctr = NetworkNamespace::new(CTR, "/proc/42/ns/net", vec![42]);
    ctr.add_interface(NifBuilder::new(CTR, 5, "vctr", "veth").link(None, Some(0)).build());
    ctr.set_nsid(0, HOST);

    let mut topo = Topology::new();
    topo.insert(host);
    topo.insert(ctr);
    relations::resolve(&mut topo);

    assert_eq!(peer_of(&topo, NifRef::new(HOST, 5)), Some(NifRef::new(CTR, 5)));
    assert_eq!(peer_of(&topo, NifRef::new(CTR, 5)), Some(NifRef::new(HOST, 5)));
}

#[test]
fn test_inconsistent_veth_keeps_prior_state() {
    const OTHER: NamespaceId = NamespaceId(4026532999);

    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 7, "veth-h", "veth").link(Some(2), Some(0)).build());
    host.set_nsid(0, CTR);

    let mut ctr = NetworkNamespace::new(CTR, "/proc/42/ns/net", vec![42]);
    ctr.add_interface(
        NifBuilder::new(CTR, 2, "veth-c", "veth")
            .peer(NifRef::new(OTHER, 9))
            .build(),
    );

    let mut topo = Topology::new();
    topo.insert(host);
    topo.insert(ctr);
    relations::resolve(&mut topo);

    assert_eq!(peer_of(&topo, NifRef::new(HOST, 7)), None);
    assert_eq!(peer_of(&topo, NifRef::new(CTR, 2)), Some(NifRef::new(OTHER, 9)));
}

#[test]
fn test_unknown_nsid_leaves_peer_unset() {
    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 7, "veth-h", "veth").link(Some(2), Some(4)).build());

    let mut topo = Topology::new();
    topo.insert(host);
    relations::resolve(&mut topo);

    assert_eq!(peer_of(&topo, NifRef::new(HOST, 7)), None);
}

#[test]
fn test_bridge_ports_match_master_indices() {
    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 1, "lo", "device").build());
    host.add_interface(NifBuilder::new(HOST, 2, "eth0", "device").build());
    host.add_interface(NifBuilder::new(HOST, 3, "docker0", "bridge").build());
    host.add_interface(NifBuilder::new(HOST, 4, "veth1", "veth").master(3).build());
    host.add_interface(NifBuilder::new(HOST, 5, "veth2", "veth").master(3).build());
    // master that is not a bridge, and one that does not exist
    host.add_interface(NifBuilder::new(HOST, 6, "veth3", "veth").master(2).build());
    host.add_interface(NifBuilder::new(HOST, 8, "veth4", "veth").master(99).build());

    let mut topo = Topology::new();
    topo.insert(host);
    relations::resolve(&mut topo);

    let ns = topo.netns(HOST).unwrap();
    let InterfaceKind::Bridge { ports } = &ns.interface(3).unwrap().details else {
        panic!("docker0 is not a bridge");
    };
    let expected: Vec<NifRef> = ns
        .interfaces
        .values()
        .filter(|nif| nif.hints.master == Some(3))
        .map(|nif| nif.nif_ref())
        .collect();
    assert_eq!(ports, &expected);

    let bridge = Some(NifRef::new(HOST, 3));
    assert_eq!(ns.interface(4).unwrap().bridge, bridge);
    assert_eq!(ns.interface(5).unwrap().bridge, bridge);
    assert_eq!(ns.interface(6).unwrap().bridge, None);
    assert_eq!(ns.interface(8).unwrap().bridge, None);
}

#[test]
fn test_address_ordering() {
    let mut addrs = vec![
        Address::new(ip("127.0.0.100"), 24, 1),
        Address::new(ip("fe80::1"), 64, 1),
        Address::new(ip("127.0.0.20"), 16, 1),
    ];
    addrs.sort();

    let shown: Vec<String> = addrs.iter().map(ToString::to_string).collect();
    assert_eq!(shown, ["127.0.0.20/16", "127.0.0.100/24", "fe80::1/64"]);
}
