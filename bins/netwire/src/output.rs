//! Text and JSON rendering.

use std::io::{self, Write};

use netwire::relations::linked_namespaces;
use netwire::{Interface, InterfaceKind, NifRef, Topology};

pub fn print_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if pretty {
        serde_json::to_writer_pretty(&mut handle, value)?;
    } else {
        serde_json::to_writer(&mut handle, value)?;
    }
    writeln!(handle)?;
    Ok(())
}

/// `name@net:[inode]`, or the raw reference if it does not resolve.
fn nif_name(topo: &Topology, nif: &NifRef) -> String {
    match topo.nif(nif) {
        Some(n) => format!("{}@{}", n.name, n.netns),
        None => format!("#{}@{}", nif.index, nif.netns),
    }
}

fn pids(topo: &Topology, pids: &[u32]) -> String {
    pids.iter()
        .map(|pid| match topo.processes.get(pid) {
            Some(name) => format!("{name}({pid})"),
            None => pid.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

pub fn print_namespaces(topo: &Topology) {
    for ns in topo.namespaces.values() {
        let linked: Vec<String> = linked_namespaces(topo, ns.id).iter().map(ToString::to_string).collect();
        println!(
            "{}  {}  interfaces {}  leader {}  linked {}",
            ns.id,
            ns.path.display(),
            ns.interfaces.len(),
            pids(topo, &ns.pids[..ns.pids.len().min(1)]),
            if linked.is_empty() { "-".to_string() } else { linked.join(",") },
        );
    }
}

fn relations(topo: &Topology, nif: &Interface) -> Vec<String> {
    let mut out = Vec::new();
    match &nif.details {
        InterfaceKind::Veth { peer: Some(peer) } => out.push(format!("peer {}", nif_name(topo, peer))),
        InterfaceKind::Bridge { ports } if !ports.is_empty() => {
            let ports: Vec<_> = ports.iter().map(|p| nif_name(topo, p)).collect();
            out.push(format!("ports {}", ports.join(",")));
        }
        InterfaceKind::Macvlan { mode, .. } => out.push(format!("mode {mode}")),
        InterfaceKind::Vlan { vid, .. } => out.push(format!("vid {vid}")),
        InterfaceKind::Vxlan(vx) => out.push(format!("vni {}", vx.vni)),
        InterfaceKind::TunTap { processors, .. } if !processors.is_empty() => {
            out.push(format!("processes {}", pids(topo, processors)));
        }
        _ => {}
    }
    if let Some(master) = nif.details.master() {
        out.push(format!("master {}", nif_name(topo, master)));
    }
    if let Some(bridge) = &nif.bridge {
        out.push(format!("bridge {}", nif_name(topo, bridge)));
    }
    if let Some(pf) = &nif.pf {
        out.push(format!("pf {}", nif_name(topo, pf)));
    }
    if let Some(bus) = &nif.bus_addr {
        out.push(format!("bus {bus}"));
    }
    out
}

pub fn print_interfaces(topo: &Topology) {
    for ns in topo.namespaces.values() {
        println!("{}:", ns.id);
        for nif in ns.sorted_interfaces() {
            println!("  {}: {} <{}> {} {}", nif.index, nif.name, nif.kind, nif.state, nif.hw_addr);
            for addr in nif.addresses() {
                println!("      inet {addr}");
            }
            let rel = relations(topo, nif);
            if !rel.is_empty() {
                println!("      {}", rel.join("  "));
            }
        }
    }
}

pub fn print_ports(topo: &Topology) {
    for ns in topo.namespaces.values() {
        println!("{}:", ns.id);
        for s in ns.sockets_v4.iter().chain(ns.sockets_v6.iter()) {
            let mapped = if s.ipv4_mapped { " (v4-mapped)" } else { "" };
            println!(
                "  {:<4} {:<12} {}:{} {}:{}  {}{mapped}",
                s.protocol,
                s.state,
                s.local_ip,
                s.local_port,
                s.remote_ip,
                s.remote_port,
                pids(topo, &s.pids),
            );
        }
    }
}

pub fn print_forwards(topo: &Topology) {
    for ns in topo.namespaces.values() {
        for fp in ns.forwarded_ports() {
            let dest = match fp.destination_netns {
                Some(id) => {
                    let nifs: Vec<_> = fp.nifs.iter().map(|n| nif_name(topo, n)).collect();
                    format!("{id} via {}", nifs.join(","))
                }
                None => "unresolved".to_string(),
            };
            println!("{}  {}  => {}  {}", ns.id, fp.range, dest, pids(topo, &fp.pids));
        }
    }
}
