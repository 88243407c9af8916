//! Rule expression analysis.
//!
//! nftables rules are small register machines: loads (`meta`, `payload`,
//! `immediate`) fill registers, `cmp`/`range` test them and `nat` consumes
//! them. [`summarize`] replays a rule and records the match conditions and
//! DNAT action port-forwarding recognizers care about. Rules translated by
//! iptables-nft carry the same information as xtables `match`/`target`
//! blobs, which are decoded as well.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::netlink::messages::RuleMessage;
use crate::netlink::messages::nftables::{CmpOp, Expr, ImmediateData, PayloadBase, meta_key};
use crate::netlink::types::nftables::{nat, verdict};
use crate::sockets::Protocol;

/// What a single rule matches on and does, as far as port forwarding goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSummary {
    pub protocol: Option<Protocol>,
    /// Destination address the rule is restricted to.
    pub destination: Option<IpAddr>,
    /// Destination port range the rule is restricted to.
    pub dport: Option<(u16, u16)>,
    /// DNAT target: address and port range (ports `None` when unchanged).
    pub dnat: Option<(IpAddr, Option<(u16, u16)>)>,
    /// Chain jumped or gone to.
    pub jump: Option<String>,
}

/// A register load that has not been consumed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Load {
    Meta(u32),
    Payload { base: PayloadBase, offset: u32, len: u32 },
    Value(Vec<u8>),
}

/// 32-bit register slot a register number starts at. Registers 1-4 are the
/// legacy 128-bit registers overlaying slots 0-15; 8-23 address single
/// 32-bit slots.
fn slot(reg: u32) -> Option<u32> {
    match reg {
        1..=4 => Some((reg - 1) * 4),
        8..=23 => Some(reg - 8),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct Registers {
    loads: Vec<(u32, u32, Load)>,
}

impl Registers {
    fn store(&mut self, reg: u32, len: u32, load: Load) {
        let Some(start) = slot(reg) else { return };
        let end = start + len.div_ceil(4).max(1);
        self.loads.retain(|(s, e, _)| *e <= start || *s >= end);
        self.loads.push((start, end, load));
    }

    fn get(&self, reg: u32) -> Option<&Load> {
        let start = slot(reg)?;
        self.loads
            .iter()
            .find(|(s, _, _)| *s == start)
            .map(|(_, _, load)| load)
    }

    fn value(&self, reg: Option<u32>) -> Option<&[u8]> {
        match self.get(reg?)? {
            Load::Value(v) => Some(v),
            _ => None,
        }
    }
}

fn be16(data: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes(data.get(..2)?.try_into().ok()?))
}

fn ne16(data: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_ne_bytes(data.get(at..at + 2)?.try_into().ok()?))
}

fn ip_of(data: &[u8]) -> Option<IpAddr> {
    match data.len() {
        4 => Some(IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(data).ok()?))),
        16 => Some(IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(data).ok()?))),
        _ => None,
    }
}

fn is_destination_address(base: PayloadBase, offset: u32, len: u32) -> bool {
    base == PayloadBase::Network && matches!((offset, len), (16, 4) | (24, 16))
}

fn is_destination_port(base: PayloadBase, offset: u32, len: u32) -> bool {
    base == PayloadBase::Transport && offset == 2 && len == 2
}

const NFPROTO_IPV4: u32 = 2;
const NF_NAT_RANGE_MAP_IPS: u32 = 1 << 0;
const NF_NAT_RANGE_PROTO_SPECIFIED: u32 = 1 << 1;
const XT_TCP_INV_DSTPT: u8 = 0x02;
const XT_UDP_INV_DSTPT: u8 = 0x02;

/// Destination port range of an `xt_tcp`/`xt_udp` match, `None` when it
/// does not restrict the destination port.
fn xt_port_match(name: &str, info: &[u8]) -> Option<(Protocol, Option<(u16, u16)>)> {
    // struct xt_tcp { u16 spts[2]; u16 dpts[2]; u8 option; u8 flg_mask; u8 flg_cmp; u8 invflags; }
    // struct xt_udp { u16 spts[2]; u16 dpts[2]; u8 invflags; }
    let (protocol, invflags) = match name {
        "tcp" => (Protocol::Tcp, info.get(11).copied().unwrap_or(0) & XT_TCP_INV_DSTPT),
        "udp" => (Protocol::Udp, info.get(8).copied().unwrap_or(0) & XT_UDP_INV_DSTPT),
        _ => return None,
    };
    let min = ne16(info, 4)?;
    let max = ne16(info, 6)?;
    let restricted = invflags == 0 && !(min == 0 && max == u16::MAX);
    Some((protocol, restricted.then_some((min, max))))
}

/// Address and port range of an xtables DNAT target.
fn xt_dnat(rev: u32, info: &[u8], ipv4: bool) -> Option<(IpAddr, Option<(u16, u16)>)> {
    let (flags, addr, ports) = if rev == 0 {
        // nf_nat_ipv4_multi_range_compat: rangesize, then
        // { flags, min_ip, max_ip, min (be16), max (be16) }
        let flags = u32::from_ne_bytes(info.get(4..8)?.try_into().ok()?);
        let addr = ip_of(info.get(8..12)?)?;
        (flags, addr, (be16(info.get(16..)?)?, be16(info.get(18..)?)?))
    } else {
        // nf_nat_range{,2}: flags, min_addr[16], max_addr[16], min_proto, max_proto
        let flags = u32::from_ne_bytes(info.get(0..4)?.try_into().ok()?);
        let addr = if ipv4 {
            ip_of(info.get(4..8)?)?
        } else {
            ip_of(info.get(4..20)?)?
        };
        (flags, addr, (be16(info.get(36..)?)?, be16(info.get(38..)?)?))
    };
    if flags & NF_NAT_RANGE_MAP_IPS == 0 {
        return None;
    }
    let ports = (flags & NF_NAT_RANGE_PROTO_SPECIFIED != 0).then_some(ports);
    Some((addr, ports))
}

/// Replay a rule's expressions. `ipv4` selects the address layout of
/// family-independent xtables blobs.
pub fn summarize(rule: &RuleMessage, ipv4: bool) -> RuleSummary {
    let mut regs = Registers::default();
    let mut out = RuleSummary::default();

    for e in &rule.exprs {
        match e {
            Expr::Meta { dreg, key } => regs.store(*dreg, 4, Load::Meta(*key)),
            Expr::Payload {
                dreg,
                base,
                offset,
                len,
            } => regs.store(
                *dreg,
                *len,
                Load::Payload {
                    base: *base,
                    offset: *offset,
                    len: *len,
                },
            ),
            Expr::Immediate {
                dreg,
                data: ImmediateData::Value(v),
            } => regs.store(*dreg, v.len() as u32, Load::Value(v.clone())),
            Expr::Immediate {
                data: ImmediateData::Verdict { code, chain },
                ..
            } => {
                if *code == verdict::JUMP || *code == verdict::GOTO {
                    out.jump = chain.clone();
                }
            }
            Expr::Cmp {
                sreg,
                op: CmpOp::Eq,
                data,
            } => match regs.get(*sreg) {
                Some(Load::Meta(meta_key::L4PROTO)) if data.len() == 1 => {
                    out.protocol = Protocol::from_number(data[0]);
                }
                Some(Load::Payload { base, offset, len }) if is_destination_address(*base, *offset, *len) => {
                    out.destination = ip_of(data);
                }
                Some(Load::Payload { base, offset, len }) if is_destination_port(*base, *offset, *len) => {
                    out.dport = be16(data).map(|p| (p, p));
                }
                _ => {}
            },
            Expr::Range {
                sreg,
                op: CmpOp::Eq,
                from,
                to,
            } => {
                if let Some(Load::Payload { base, offset, len }) = regs.get(*sreg)
                    && is_destination_port(*base, *offset, *len)
                    && let (Some(lo), Some(hi)) = (be16(from), be16(to))
                {
                    out.dport = Some((lo, hi));
                }
            }
            Expr::Match { name, info, .. } => {
                if let Some((protocol, dport)) = xt_port_match(name, info) {
                    out.protocol = out.protocol.or(Some(protocol));
                    if dport.is_some() {
                        out.dport = dport;
                    }
                }
            }
            Expr::Target { name, rev, info } if name == "DNAT" => {
                out.dnat = xt_dnat(*rev, info, ipv4);
            }
            Expr::Nat {
                nat_type,
                family,
                reg_addr_min,
                reg_proto_min,
                reg_proto_max,
                ..
            } if *nat_type == nat::DNAT => {
                let addr = regs.value(*reg_addr_min).and_then(|v| {
                    if *family == NFPROTO_IPV4 {
                        ip_of(v.get(..4)?)
                    } else {
                        ip_of(v)
                    }
                });
                let min = regs.value(*reg_proto_min).and_then(be16);
                let max = regs.value(*reg_proto_max).and_then(be16).or(min);
                out.dnat = addr.map(|a| (a, min.zip(max)));
            }
            _ => {}
        }
    }
    out
}
