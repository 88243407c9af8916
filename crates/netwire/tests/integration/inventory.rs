//! Namespace inventory and process table from a fake procfs.

use netwire::{
    InterfaceKind, Inventory, NamespaceId, NetworkNamespace, NifRef, ProcInventory, ProcessTable, Topology, tuntap,
};

use crate::common::FakeRoot;

#[test]
fn test_namespaces_from_procfs() {
    let root = FakeRoot::new("inventory");
    let host = root.namespace("host");
    let ctr = root.namespace("ctr");

    root.process(1, 0, "systemd", "host");
    root.process(310, 1, "containerd", "host");
    root.process(4242, 310, "nginx", "ctr");
    root.process(4250, 4242, "nginx: worker", "ctr");
    let named = root.named("blue", "blue");

    let inventory = ProcInventory::new().proc_root(root.proc()).netns_dir(root.netns_dir());
    let found = inventory.namespaces().unwrap();

    let ids: Vec<_> = found.iter().map(|ns| ns.id).collect();
    let mut expected = vec![host, ctr, named];
    expected.sort();
    assert_eq!(ids, expected);

    let ctr_ref = found.iter().find(|ns| ns.id == ctr).unwrap();
    assert_eq!(ctr_ref.pids, vec![4242]);
    assert_eq!(ctr_ref.path, root.proc().join("4242/ns/net"));

    let host_ref = found.iter().find(|ns| ns.id == host).unwrap();
    assert_eq!(host_ref.pids, vec![1]);

    let blue = found.iter().find(|ns| ns.id == named).unwrap();
    assert!(blue.pids.is_empty());
    assert_eq!(blue.path, root.netns_dir().join("blue"));
}

#[test]
fn test_named_namespace_with_processes_is_not_duplicated() {
    let root = FakeRoot::new("inventory-dup");
    root.process(1, 0, "init", "host");
    let ctr = root.named("ctr", "ctr");
    root.process(77, 1, "sleep", "ctr");

    let inventory = ProcInventory::new().proc_root(root.proc()).netns_dir(root.netns_dir());
    let found = inventory.namespaces().unwrap();

    assert_eq!(found.len(), 2);
    let ctr_ref = found.iter().find(|ns| ns.id == ctr).unwrap();
    assert_eq!(ctr_ref.pids, vec![77]);
}

#[test]
fn test_process_table() {
    let root = FakeRoot::new("processes");
    let host = root.namespace("host");
    root.process(1, 0, "systemd", "host");
    root.process(900, 1, "tmux: server", "host");

    let table = ProcessTable::scan(&root.proc()).unwrap();
    assert_eq!(table.netns_of(900), Some(host));
    assert_eq!(table.get(900).unwrap().ppid, 1);
    assert_eq!(table.names().get(&900).map(String::as_str), Some("tmux: server"));
    assert_eq!(table.leaders().get(&host), Some(&vec![1]));
}

#[test]
fn test_missing_procfs_is_an_error() {
    let root = FakeRoot::new("noproc");
    let inventory = ProcInventory::new().proc_root(root.proc().join("missing"));
    assert!(inventory.namespaces().is_err());
}

fn tap(netns: NamespaceId, index: u32, name: &str) -> netwire::Interface {
    use netwire::topology::TunTapMode;

    let mut nif = crate::common::NifBuilder::new(netns, index, name, "tun").build();
    nif.details = InterfaceKind::TunTap {
        mode: TunTapMode::Tap,
        processors: Vec::new(),
    };
    nif
}

fn processors(topo: &Topology, nif: NifRef) -> Vec<u32> {
    match &topo.nif(&nif).unwrap().details {
        InterfaceKind::TunTap { processors, .. } => processors.clone(),
        other => panic!("not a tun/tap: {other:?}"),
    }
}

#[test]
fn test_tuntap_processors() {
    let root = FakeRoot::new("tuntap");
    let vm = root.namespace("vm");
    root.process(1, 0, "init", "host");
    root.process(500, 1, "qemu-system-x86", "vm");
    root.process(501, 1, "openvpn", "host");
    root.tun_fd(500, 12, "tap0");
    root.tun_fd(501, 5, "tap0");

    let mut ns = NetworkNamespace::new(vm, root.proc().join("500/ns/net"), vec![500]);
    ns.add_interface(tap(vm, 4, "tap0"));
    let mut topo = Topology::new();
    topo.insert(ns);

    let processes = ProcessTable::scan(&root.proc()).unwrap();
    tuntap::resolve_with(&mut topo, &processes, &root.proc(), |_, _| None);

    // openvpn's tap0 lives in another namespace
    assert_eq!(processors(&topo, NifRef::new(vm, 4)), vec![500]);
}

#[test]
fn test_tuntap_device_in_other_namespace() {
    let root = FakeRoot::new("tuntap-moved");
    let host = root.namespace("host");
    let guest = root.namespace("guest");
    root.process(1, 0, "init", "host");
    root.process(700, 1, "firecracker", "host");
    root.tun_fd(700, 9, "tap0");

    // same name on both sides; only the guest's device is served by pid 700
    let mut host_ns = NetworkNamespace::new(host, root.proc().join("1/ns/net"), vec![1]);
    host_ns.add_interface(tap(host, 3, "tap0"));
    let mut guest_ns = NetworkNamespace::new(guest, root.netns_dir().join("guest"), Vec::new());
    guest_ns.add_interface(tap(guest, 2, "tap0"));
    let mut topo = Topology::new();
    topo.insert(host_ns);
    topo.insert(guest_ns);

    let processes = ProcessTable::scan(&root.proc()).unwrap();
    tuntap::resolve_with(&mut topo, &processes, &root.proc(), |pid, fd| {
        (pid == 700 && fd == 9).then_some(guest)
    });

    assert_eq!(processors(&topo, NifRef::new(guest, 2)), vec![700]);
    assert!(processors(&topo, NifRef::new(host, 3)).is_empty());
}
