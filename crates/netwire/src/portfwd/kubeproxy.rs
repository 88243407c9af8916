//! kube-proxy (iptables mode) services.
//!
//! `KUBE-SERVICES` matches cluster IPs and `KUBE-NODEPORTS` node ports;
//! each matching rule jumps to a per-service `KUBE-SVC-*` chain (node ports
//! possibly through `KUBE-EXT-*`), which load-balances across `KUBE-SEP-*`
//! endpoint chains. Every endpoint DNAT yields one forwarded port.

use std::collections::BTreeSet;

use super::expr::summarize;
use super::{ForwardedPortRange, Recognizer, RuleSet, Table};
use crate::topology::Family;

const ENTRY_CHAINS: [&str; 2] = ["KUBE-SERVICES", "KUBE-NODEPORTS"];
const SERVICE_PREFIXES: [&str; 2] = ["KUBE-SVC-", "KUBE-EXT-"];
const ENDPOINT_PREFIX: &str = "KUBE-SEP-";

#[derive(Debug, Clone, Copy, Default)]
pub struct KubeProxy;

fn is_service_chain(name: &str) -> bool {
    SERVICE_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// Endpoint chains reachable from a service chain.
fn endpoints(nat: &Table, service: &str, ipv4: bool) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut pending = vec![service.to_string()];
    let mut out = Vec::new();

    while let Some(chain) = pending.pop() {
        if !seen.insert(chain.clone()) {
            continue;
        }
        for rule in nat.chain(&chain).unwrap_or_default() {
            let Some(target) = summarize(rule, ipv4).jump else {
                continue;
            };
            if target.starts_with(ENDPOINT_PREFIX) {
                if !out.contains(&target) {
                    out.push(target);
                }
            } else if is_service_chain(&target) {
                pending.push(target);
            }
        }
    }
    out
}

impl Recognizer for KubeProxy {
    fn name(&self) -> &str {
        "kube-proxy"
    }

    fn recognize(&self, rules: &RuleSet, family: Family) -> Vec<ForwardedPortRange> {
        let Some(nat) = rules.table("nat") else {
            return Vec::new();
        };
        let ipv4 = family == Family::Ipv4;

        let mut out = Vec::new();
        for entry in ENTRY_CHAINS {
            for rule in nat.chain(entry).unwrap_or_default() {
                let service = summarize(rule, ipv4);
                let (Some(protocol), Some((port_min, port_max)), Some(jump)) =
                    (service.protocol, service.dport, service.jump)
                else {
                    continue;
                };
                if !is_service_chain(&jump) {
                    continue;
                }
                let ip = service.destination.unwrap_or(family.unspecified());

                for sep in endpoints(nat, &jump, ipv4) {
                    for rule in nat.chain(&sep).unwrap_or_default() {
                        let Some((forward_ip, forward_ports)) = summarize(rule, ipv4).dnat else {
                            continue;
                        };
                        let (forward_port_min, forward_port_max) = forward_ports.unwrap_or((port_min, port_max));
                        out.push(ForwardedPortRange {
                            protocol,
                            ip,
                            port_min,
                            port_max,
                            forward_ip,
                            forward_port_min,
                            forward_port_max,
                        });
                    }
                }
            }
        }
        out
    }
}
