//! WhereIs routing simulation and forwarded port destinations.

use netwire::portfwd::whereis::{self, where_is};
use netwire::sockets::{self, InodeMap};
use netwire::topology::Route;
use netwire::{
    Family, ForwardedPort, ForwardedPortRange, NamespaceId, NetworkNamespace, NifRef, SocketProtocol, Topology,
    relations,
};

use crate::common::{FakeRoot, NifBuilder, ip, sa, socket_row};

const LISTEN: u8 = 0x0a;

fn route(dst: &str, prefix: u8, via: Option<&str>, nif: NifRef) -> Route {
    Route {
        family: Family::of(&ip(dst)),
        route_type: Default::default(),
        destination: ip(dst),
        prefix_len: prefix,
        next_hop: via.map(ip),
        nif: Some(nif),
        table: 254,
        priority: 0,
        preference: 0,
    }
}

/// Host H with docker0 10.0.0.1/24 bridging to container C (`veth-c`
/// 10.0.0.5/24), relations resolved through NSIDs.
fn docker_host(host: NamespaceId, ctr: NamespaceId, ctr_path: std::path::PathBuf) -> Topology {
    let mut h = NetworkNamespace::new(host, "/proc/1/ns/net", vec![1]);
    h.add_interface(NifBuilder::new(host, 1, "lo", "device").addr("127.0.0.1", 8).build());
    h.add_interface(NifBuilder::new(host, 2, "eth0", "device").addr("203.0.113.1", 24).build());
    h.add_interface(NifBuilder::new(host, 3, "docker0", "bridge").addr("10.0.0.1", 24).build());
    h.add_interface(
        NifBuilder::new(host, 7, "vethd3adb33", "veth")
            .master(3)
            .link(Some(2), Some(0))
            .build(),
    );
    h.set_nsid(0, ctr);
    h.routes_v4 = vec![
        route("0.0.0.0", 0, Some("203.0.113.254"), NifRef::new(host, 2)),
        route("10.0.0.0", 24, None, NifRef::new(host, 3)),
    ];

    let mut c = NetworkNamespace::new(ctr, ctr_path, vec![42]);
    c.add_interface(NifBuilder::new(ctr, 1, "lo", "device").addr("127.0.0.1", 8).build());
    c.add_interface(
        NifBuilder::new(ctr, 2, "veth-c", "veth")
            .addr("10.0.0.5", 24)
            .link(Some(7), Some(0))
            .build(),
    );
    c.set_nsid(0, host);
    c.routes_v4 = vec![
        route("0.0.0.0", 0, Some("10.0.0.1"), NifRef::new(ctr, 2)),
        route("10.0.0.0", 24, None, NifRef::new(ctr, 2)),
    ];

    let mut topo = Topology::new();
    topo.insert(h);
    topo.insert(c);
    relations::resolve(&mut topo);
    topo
}

#[test]
fn test_local_hit_skips_routes() {
    let host = NamespaceId(1);
    let mut topo = docker_host(host, NamespaceId(2), "/proc/42/ns/net".into());
    topo.netns_mut(host).unwrap().routes_v4.clear();

    assert_eq!(where_is(&topo, host, &ip("10.0.0.1")), Some((host, NifRef::new(host, 3))));
    assert_eq!(where_is(&topo, host, &ip("127.0.0.53")), Some((host, NifRef::new(host, 1))));
}

#[test]
fn test_miss_without_route() {
    let host = NamespaceId(1);
    let mut topo = docker_host(host, NamespaceId(2), "/proc/42/ns/net".into());
    topo.netns_mut(host).unwrap().routes_v4.clear();

    assert_eq!(where_is(&topo, host, &ip("10.0.0.5")), None);
    assert_eq!(where_is(&topo, host, &ip("fd00::5")), None);
}

#[test]
fn test_through_bridge_into_container() {
    let (host, ctr) = (NamespaceId(1), NamespaceId(2));
    let topo = docker_host(host, ctr, "/proc/42/ns/net".into());

    assert_eq!(where_is(&topo, host, &ip("10.0.0.5")), Some((ctr, NifRef::new(ctr, 2))));
    // out of the physical uplink
    assert_eq!(where_is(&topo, host, &ip("8.8.8.8")), None);
    // from inside the container, the host's bridge address is not a veth peer address
    assert_eq!(where_is(&topo, ctr, &ip("10.0.0.1")), None);
}

#[test]
fn test_routing_loop_terminates() {
    let (a, b) = (NamespaceId(1), NamespaceId(2));

    let mut na = NetworkNamespace::new(a, "/a", vec![]);
    na.add_interface(NifBuilder::new(a, 2, "va", "veth").addr("192.0.2.1", 30).peer(NifRef::new(b, 2)).build());
    na.routes_v4 = vec![route("0.0.0.0", 0, Some("192.0.2.2"), NifRef::new(a, 2))];

    let mut nb = NetworkNamespace::new(b, "/b", vec![]);
    nb.add_interface(NifBuilder::new(b, 2, "vb", "veth").addr("192.0.2.2", 30).peer(NifRef::new(a, 2)).build());
    nb.routes_v4 = vec![route("0.0.0.0", 0, Some("192.0.2.1"), NifRef::new(b, 2))];

    let mut topo = Topology::new();
    topo.insert(na);
    topo.insert(nb);

    assert_eq!(where_is(&topo, a, &ip("198.51.100.7")), None);
}

#[test]
fn test_forwarded_port_end_to_end() {
    let root = FakeRoot::new("forwarding");
    let host = root.namespace("host");
    let ctr = root.namespace("ctr");
    root.process(1, 0, "dockerd", "host");
    root.process(42, 1, "nginx", "ctr");
    root.net_table(42, "tcp", &[socket_row(0, sa("0.0.0.0:80"), sa("0.0.0.0:0"), LISTEN, 5001)]);
    root.socket_fd(42, 6, 5001);

    let mut topo = docker_host(host, ctr, root.proc().join("42/ns/net"));

    let inodes = InodeMap::scan(&root.proc());
    let (v4, v6) = sockets::discover(topo.netns(ctr).unwrap(), &root.proc(), &inodes);
    let c = topo.netns_mut(ctr).unwrap();
    c.sockets_v4 = v4;
    c.sockets_v6 = v6;

    topo.netns_mut(host).unwrap().forwarded_v4 = vec![ForwardedPort::from(ForwardedPortRange {
        protocol: SocketProtocol::Tcp,
        ip: ip("203.0.113.1"),
        port_min: 8080,
        port_max: 8080,
        forward_ip: ip("10.0.0.5"),
        forward_port_min: 80,
        forward_port_max: 80,
    })];
    whereis::resolve(&mut topo);

    let fp = &topo.netns(host).unwrap().forwarded_v4[0];
    assert_eq!(fp.destination_netns, Some(ctr));
    let names: Vec<&str> = fp.nifs.iter().map(|n| topo.nif(n).unwrap().name.as_str()).collect();
    assert_eq!(names, ["veth-c"]);
    assert_eq!(fp.pids, vec![42]);
}
