//! Docker-style host port publishing.
//!
//! Docker (and most CNI port-mapping plugins) publish a port with a DNAT
//! rule in the `nat` table that matches protocol, destination port and
//! optionally the host address. Any such rule in any chain of the `nat`
//! table is reported, which also covers the embedded DNS resolver rules in
//! `DOCKER_OUTPUT` inside containers.

use super::expr::summarize;
use super::{ForwardedPortRange, Recognizer, RuleSet};
use crate::topology::Family;

#[derive(Debug, Clone, Copy, Default)]
pub struct Docker;

impl Recognizer for Docker {
    fn name(&self) -> &str {
        "docker"
    }

    fn recognize(&self, rules: &RuleSet, family: Family) -> Vec<ForwardedPortRange> {
        let Some(nat) = rules.table("nat") else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for rule in nat.rules() {
            let summary = summarize(rule, family == Family::Ipv4);
            let (Some(protocol), Some((port_min, port_max)), Some((forward_ip, forward_ports))) =
                (summary.protocol, summary.dport, summary.dnat)
            else {
                continue;
            };
            let (forward_port_min, forward_port_max) = forward_ports.unwrap_or((port_min, port_max));
            out.push(ForwardedPortRange {
                protocol,
                ip: summary.destination.unwrap_or(family.unspecified()),
                port_min,
                port_max,
                forward_ip,
                forward_port_min,
                forward_port_max,
            });
        }
        out
    }
}
