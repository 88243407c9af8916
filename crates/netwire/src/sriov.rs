//! SR-IOV physical/virtual function topology from sysfs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::topology::{NifRef, SriovRole, Topology};

fn pci_device(sysfs: &Path, bus: &str) -> PathBuf {
    sysfs.join("bus/pci/devices").join(bus)
}

/// Bus address of the physical function behind a virtual function.
fn physfn(device: &Path) -> Option<String> {
    let target = std::fs::read_link(device.join("physfn")).ok()?;
    target.file_name()?.to_str().map(str::to_string)
}

/// Mark PFs and VFs and link each VF to its PF.
///
/// Requires bus addresses; interfaces without one are ignored.
pub fn resolve(topo: &mut Topology, sysfs: &Path) {
    let by_bus: HashMap<String, NifRef> = topo
        .namespaces
        .values()
        .flat_map(|ns| ns.interfaces.values())
        .filter_map(|nif| nif.bus_addr.clone().map(|bus| (bus, nif.nif_ref())))
        .collect();

    let mut buses: Vec<(&String, &NifRef)> = by_bus.iter().collect();
    buses.sort_unstable_by(|a, b| a.1.cmp(b.1));

    for (bus, &dev) in buses {
        let device = pci_device(sysfs, bus);

        if let Some(pf_bus) = physfn(&device) {
            let vf = dev;
            if let Some(nif) = topo.nif_mut(&vf) {
                nif.sriov_role = SriovRole::Vf;
            }
            let Some(&pf) = by_bus.get(&pf_bus) else {
                tracing::debug!(vf = %bus, pf = %pf_bus, "physical function not discovered");
                continue;
            };
            if let Some(nif) = topo.nif_mut(&vf) {
                nif.pf = Some(pf);
            }
            if let Some(nif) = topo.nif_mut(&pf) {
                nif.sriov_role = SriovRole::Pf;
                if !nif.slaves.contains(&vf) {
                    nif.slaves.push(vf);
                }
            }
        } else if device.join("sriov_numvfs").exists()
            && let Some(nif) = topo.nif_mut(&dev)
        {
            nif.sriov_role = SriovRole::Pf;
        }
    }
}
