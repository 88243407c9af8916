//! SR-IOV topology from a fake sysfs.

use netwire::{NamespaceId, NetworkNamespace, NifRef, SriovRole, Topology, sriov};

use crate::common::{FakeRoot, NifBuilder};

const HOST: NamespaceId = NamespaceId(4026531840);
const CTR: NamespaceId = NamespaceId(4026532301);

#[test]
fn test_physical_function_with_two_virtual_functions() {
    let root = FakeRoot::new("sriov");
    root.physical_function("0000:3b:00.0", 2);
    root.virtual_function("0000:3b:02.0", "0000:3b:00.0");
    root.virtual_function("0000:3b:02.1", "0000:3b:00.0");
    // plain PCI NIC
    root.pci_device("0000:5e:00.0");

    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 2, "ens1f0", "device").bus("0000:3b:00.0").build());
    host.add_interface(NifBuilder::new(HOST, 3, "ens1f0v0", "device").bus("0000:3b:02.0").build());
    host.add_interface(NifBuilder::new(HOST, 4, "eno1", "device").bus("0000:5e:00.0").build());
    // second VF moved into a container
    let mut ctr = NetworkNamespace::new(CTR, "/proc/42/ns/net", vec![42]);
    ctr.add_interface(NifBuilder::new(CTR, 9, "net1", "device").bus("0000:3b:02.1").build());

    let mut topo = Topology::new();
    topo.insert(host);
    topo.insert(ctr);
    sriov::resolve(&mut topo, &root.sys());

    let pf_ref = NifRef::new(HOST, 2);
    let pf = topo.nif(&pf_ref).unwrap();
    assert_eq!(pf.sriov_role, SriovRole::Pf);

    let vfs: Vec<NifRef> = pf
        .slaves
        .iter()
        .filter(|s| topo.nif(s).is_some_and(|n| n.sriov_role == SriovRole::Vf))
        .copied()
        .collect();
    assert_eq!(vfs.len(), 2);
    assert!(vfs.contains(&NifRef::new(CTR, 9)));
    for vf in &vfs {
        assert_eq!(topo.nif(vf).unwrap().pf, Some(pf_ref));
    }

    let plain = topo.nif(&NifRef::new(HOST, 4)).unwrap();
    assert_eq!(plain.sriov_role, SriovRole::None);
    assert!(plain.slaves.is_empty());
}

#[test]
fn test_virtual_function_without_known_pf() {
    let root = FakeRoot::new("sriov-orphan");
    root.virtual_function("0000:3b:02.0", "0000:3b:00.0");

    let mut host = NetworkNamespace::new(HOST, "/proc/1/ns/net", vec![1]);
    host.add_interface(NifBuilder::new(HOST, 3, "ens1f0v0", "device").bus("0000:3b:02.0").build());
    let mut topo = Topology::new();
    topo.insert(host);
    sriov::resolve(&mut topo, &root.sys());

    let vf = topo.nif(&NifRef::new(HOST, 3)).unwrap();
    assert_eq!(vf.sriov_role, SriovRole::Vf);
    assert_eq!(vf.pf, None);
}
