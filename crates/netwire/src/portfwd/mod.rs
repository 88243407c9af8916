//! Forwarded ports.
//!
//! Port forwarding is recognized from the nftables rule sets of each
//! namespace (which includes iptables rules through the nft compat layer).
//! [`Recognizer`]s turn a rule set into [`ForwardedPortRange`]s; the
//! [`whereis`] pass then finds the namespace, interface and processes the
//! rewritten destination ends up at.

mod docker;
mod expr;
mod kubeproxy;
mod rules;
pub mod whereis;

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

pub use docker::Docker;
pub use expr::{RuleSummary, summarize};
pub use kubeproxy::KubeProxy;
pub use rules::{RuleSet, Table};

use crate::netlink::{Connection, Result};
use crate::sockets::Protocol;
use crate::topology::{Family, NamespaceId, NifRef};

/// A forwarded port range as recognized from rules.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct ForwardedPortRange {
    pub protocol: Protocol,
    /// Bound address; unspecified when any local address matches.
    pub ip: IpAddr,
    pub port_min: u16,
    pub port_max: u16,
    pub forward_ip: IpAddr,
    pub forward_port_min: u16,
    pub forward_port_max: u16,
}

impl fmt::Display for ForwardedPortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoint = |f: &mut fmt::Formatter<'_>, ip: &IpAddr, min: u16, max: u16| {
            match ip {
                IpAddr::V4(ip) => write!(f, "{ip}:{min}")?,
                IpAddr::V6(ip) => write!(f, "[{ip}]:{min}")?,
            }
            if max != min {
                write!(f, "-{max}")?;
            }
            Ok(())
        };
        write!(f, "{} ", self.protocol)?;
        endpoint(f, &self.ip, self.port_min, self.port_max)?;
        f.write_str(" -> ")?;
        endpoint(f, &self.forward_ip, self.forward_port_min, self.forward_port_max)
    }
}

/// A forwarded port with its resolved destination.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct ForwardedPort {
    #[cfg_attr(feature = "output", serde(flatten))]
    pub range: ForwardedPortRange,
    /// Namespace the forwarded traffic is delivered in, if resolvable.
    pub destination_netns: Option<NamespaceId>,
    pub nifs: Vec<NifRef>,
    /// Processes with a socket ready to serve the forwarded traffic.
    pub pids: Vec<u32>,
}

impl From<ForwardedPortRange> for ForwardedPort {
    fn from(range: ForwardedPortRange) -> Self {
        Self {
            range,
            destination_netns: None,
            nifs: Vec::new(),
            pids: Vec::new(),
        }
    }
}

/// Recognizes forwarded ports in a rule set.
pub trait Recognizer: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, rules: &RuleSet, family: Family) -> Vec<ForwardedPortRange>;
}

/// Docker and kube-proxy.
pub fn default_recognizers() -> Vec<Arc<dyn Recognizer>> {
    vec![Arc::new(Docker), Arc::new(KubeProxy)]
}

/// nftables family number of an address family.
pub(crate) fn nfproto(family: Family) -> u8 {
    match family {
        Family::Ipv4 => 2,
        Family::Ipv6 => 10,
    }
}

/// Run `recognizers` against an already fetched rule set.
pub fn recognize(rules: &RuleSet, family: Family, recognizers: &[Arc<dyn Recognizer>]) -> Vec<ForwardedPort> {
    let mut out = Vec::new();
    for recognizer in recognizers {
        for range in recognizer.recognize(rules, family) {
            tracing::debug!(recognizer = recognizer.name(), "discovered {range}");
            out.push(ForwardedPort::from(range));
        }
    }
    out
}

/// Dump the IPv4 and IPv6 rule sets on a netfilter connection and recognize
/// forwarded ports in each.
pub async fn discover(
    conn: &Connection,
    recognizers: &[Arc<dyn Recognizer>],
) -> Result<(Vec<ForwardedPort>, Vec<ForwardedPort>)> {
    let v4 = RuleSet::fetch(conn, Family::Ipv4).await?;
    let v6 = RuleSet::fetch(conn, Family::Ipv6).await?;
    Ok((
        recognize(&v4, Family::Ipv4, recognizers),
        recognize(&v6, Family::Ipv6, recognizers),
    ))
}
