//! nf_tables table, chain and rule messages.
//!
//! Only the expressions port-forwarding recognition looks at are decoded;
//! everything else is kept as [`Expr::Other`] with its name. Integer
//! attributes inside nf_tables messages are big endian.

use crate::netlink::attr::{AttrIter, get};
use crate::netlink::parse::{FromNetlink, PResult, parse_attr, parse_header, parse_string_from_bytes};
use crate::netlink::types::nftables::{
    NfGenMsg, chain, cmp, data, expr, immediate, meta, nat, payload, range, rule, table, xt,
};

#[derive(Debug, Clone, Default)]
pub struct TableMessage {
    pub family: u8,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChainMessage {
    pub family: u8,
    pub table: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct RuleMessage {
    pub family: u8,
    pub table: String,
    pub chain: String,
    pub handle: u64,
    pub exprs: Vec<Expr>,
}

/// Comparison operator of `cmp` and `range`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CmpOp {
    fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Eq,
            1 => Self::Neq,
            2 => Self::Lt,
            3 => Self::Lte,
            4 => Self::Gt,
            5 => Self::Gte,
            _ => return None,
        })
    }
}

/// Header a `payload` expression loads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadBase {
    LinkLayer,
    Network,
    Transport,
    Other(u32),
}

impl From<u32> for PayloadBase {
    fn from(v: u32) -> Self {
        match v {
            0 => Self::LinkLayer,
            1 => Self::Network,
            2 => Self::Transport,
            other => Self::Other(other),
        }
    }
}

/// `meta` keys of interest.
pub mod meta_key {
    pub const IIFNAME: u32 = 6;
    pub const OIFNAME: u32 = 7;
    pub const NFPROTO: u32 = 15;
    pub const L4PROTO: u32 = 16;
}

/// Data loaded by an `immediate` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImmediateData {
    Value(Vec<u8>),
    Verdict { code: i32, chain: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Cmp {
        sreg: u32,
        op: CmpOp,
        data: Vec<u8>,
    },
    Payload {
        dreg: u32,
        base: PayloadBase,
        offset: u32,
        len: u32,
    },
    Meta {
        dreg: u32,
        key: u32,
    },
    Immediate {
        dreg: u32,
        data: ImmediateData,
    },
    Nat {
        nat_type: u32,
        family: u32,
        reg_addr_min: Option<u32>,
        reg_addr_max: Option<u32>,
        reg_proto_min: Option<u32>,
        reg_proto_max: Option<u32>,
    },
    Range {
        sreg: u32,
        op: CmpOp,
        from: Vec<u8>,
        to: Vec<u8>,
    },
    /// xtables compat match.
    Match {
        name: String,
        rev: u32,
        info: Vec<u8>,
    },
    /// xtables compat target.
    Target {
        name: String,
        rev: u32,
        info: Vec<u8>,
    },
    Other(String),
}

impl Expr {
    fn decode(name: &str, body: &[u8]) -> Option<Self> {
        let attrs: Vec<(u16, &[u8])> = AttrIter::new(body).collect();
        let find = |id: u16| attrs.iter().find(|(t, _)| *t == id).map(|(_, d)| *d);
        let be32 = |id: u16| find(id).and_then(|d| get::u32_be(d).ok());

        Some(match name {
            "cmp" => Expr::Cmp {
                sreg: be32(cmp::SREG)?,
                op: CmpOp::from_u32(be32(cmp::OP)?)?,
                data: data_value(find(cmp::DATA)?)?,
            },
            "payload" => Expr::Payload {
                dreg: be32(payload::DREG)?,
                base: PayloadBase::from(be32(payload::BASE)?),
                offset: be32(payload::OFFSET)?,
                len: be32(payload::LEN)?,
            },
            "meta" => Expr::Meta {
                dreg: be32(meta::DREG)?,
                key: be32(meta::KEY)?,
            },
            "immediate" => Expr::Immediate {
                dreg: be32(immediate::DREG)?,
                data: immediate_data(find(immediate::DATA)?)?,
            },
            "nat" => Expr::Nat {
                nat_type: be32(nat::TYPE)?,
                family: be32(nat::FAMILY)?,
                reg_addr_min: be32(nat::REG_ADDR_MIN),
                reg_addr_max: be32(nat::REG_ADDR_MAX),
                reg_proto_min: be32(nat::REG_PROTO_MIN),
                reg_proto_max: be32(nat::REG_PROTO_MAX),
            },
            "range" => Expr::Range {
                sreg: be32(range::SREG)?,
                op: CmpOp::from_u32(be32(range::OP)?)?,
                from: data_value(find(range::FROM)?)?,
                to: data_value(find(range::TO)?)?,
            },
            "match" | "target" => {
                let xt_name = parse_string_from_bytes(find(xt::NAME)?);
                let rev = be32(xt::REV).unwrap_or(0);
                let info = find(xt::INFO).unwrap_or_default().to_vec();
                if name == "match" {
                    Expr::Match {
                        name: xt_name,
                        rev,
                        info,
                    }
                } else {
                    Expr::Target {
                        name: xt_name,
                        rev,
                        info,
                    }
                }
            }
            other => Expr::Other(other.to_string()),
        })
    }
}

/// NFTA_DATA_VALUE inside an NFTA_DATA nest.
fn data_value(nest: &[u8]) -> Option<Vec<u8>> {
    AttrIter::new(nest)
        .find(|(t, _)| *t == data::VALUE)
        .map(|(_, d)| d.to_vec())
}

fn immediate_data(nest: &[u8]) -> Option<ImmediateData> {
    for (t, d) in AttrIter::new(nest) {
        match t {
            data::VALUE => return Some(ImmediateData::Value(d.to_vec())),
            data::VERDICT => {
                let mut code = None;
                let mut chain = None;
                for (vt, vd) in AttrIter::new(d) {
                    match vt {
                        data::VERDICT_CODE => code = get::i32_be(vd).ok(),
                        data::VERDICT_CHAIN => chain = Some(parse_string_from_bytes(vd)),
                        _ => {}
                    }
                }
                return Some(ImmediateData::Verdict { code: code?, chain });
            }
            _ => {}
        }
    }
    None
}

fn parse_exprs(list: &[u8]) -> Vec<Expr> {
    let mut exprs = Vec::new();
    for (t, elem) in AttrIter::new(list) {
        if t != expr::LIST_ELEM {
            continue;
        }
        let mut name = None;
        let mut body: &[u8] = &[];
        for (et, ed) in AttrIter::new(elem) {
            match et {
                expr::NAME => name = Some(parse_string_from_bytes(ed)),
                expr::DATA => body = ed,
                _ => {}
            }
        }
        let Some(name) = name else { continue };
        match Expr::decode(&name, body) {
            Some(e) => exprs.push(e),
            None => {
                tracing::trace!(expr = %name, "undecodable nftables expression");
                exprs.push(Expr::Other(name));
            }
        }
    }
    exprs
}

fn nfgen_family(input: &mut &[u8]) -> PResult<u8> {
    let header = parse_header(input, NfGenMsg::SIZE)?;
    Ok(NfGenMsg::from_bytes(header).map_or(0, |h| h.nfgen_family))
}

impl FromNetlink for TableMessage {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let mut msg = TableMessage {
            family: nfgen_family(input)?,
            ..Default::default()
        };
        while input.len() >= 4 {
            let Ok((t, d)) = parse_attr(input) else { break };
            if t == table::NAME {
                msg.name = parse_string_from_bytes(d);
            }
        }
        Ok(msg)
    }
}

impl FromNetlink for ChainMessage {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let mut msg = ChainMessage {
            family: nfgen_family(input)?,
            ..Default::default()
        };
        while input.len() >= 4 {
            let Ok((t, d)) = parse_attr(input) else { break };
            match t {
                chain::TABLE => msg.table = parse_string_from_bytes(d),
                chain::NAME => msg.name = parse_string_from_bytes(d),
                _ => {}
            }
        }
        Ok(msg)
    }
}

impl FromNetlink for RuleMessage {
    fn parse(input: &mut &[u8]) -> PResult<Self> {
        let mut msg = RuleMessage {
            family: nfgen_family(input)?,
            ..Default::default()
        };
        while input.len() >= 4 {
            let Ok((t, d)) = parse_attr(input) else { break };
            match t {
                rule::TABLE => msg.table = parse_string_from_bytes(d),
                rule::CHAIN => msg.chain = parse_string_from_bytes(d),
                rule::HANDLE => msg.handle = get::u64_be(d).unwrap_or(0),
                rule::EXPRESSIONS => msg.exprs = parse_exprs(d),
                _ => {}
            }
        }
        Ok(msg)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    //! Wire-format helpers shared with the port-forwarding tests.

    use super::*;
    use crate::netlink::messages::link::tests::push_attr;

    fn nest(kind: u16, build: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        let mut inner = Vec::new();
        build(&mut inner);
        let mut out = Vec::new();
        push_attr(&mut out, kind | 0x8000, &inner);
        out
    }

    fn be32(buf: &mut Vec<u8>, kind: u16, v: u32) {
        push_attr(buf, kind, &v.to_be_bytes());
    }

    fn value(buf: &mut Vec<u8>, kind: u16, bytes: &[u8]) {
        buf.extend(nest(kind, |b| push_attr(b, data::VALUE, bytes)));
    }

    /// One NFTA_LIST_ELEM carrying an expression.
    pub(crate) fn elem(name: &str, body: impl FnOnce(&mut Vec<u8>)) -> Vec<u8> {
        nest(expr::LIST_ELEM, |b| {
            let mut cname = name.as_bytes().to_vec();
            cname.push(0);
            push_attr(b, expr::NAME, &cname);
            b.extend(nest(expr::DATA, body));
        })
    }

    pub(crate) fn meta_elem(dreg: u32, key: u32) -> Vec<u8> {
        elem("meta", |b| {
            be32(b, meta::DREG, dreg);
            be32(b, meta::KEY, key);
        })
    }

    pub(crate) fn cmp_elem(sreg: u32, bytes: &[u8]) -> Vec<u8> {
        elem("cmp", |b| {
            be32(b, cmp::SREG, sreg);
            be32(b, cmp::OP, 0);
            value(b, cmp::DATA, bytes);
        })
    }

    pub(crate) fn payload_elem(dreg: u32, base: u32, offset: u32, len: u32) -> Vec<u8> {
        elem("payload", |b| {
            be32(b, payload::DREG, dreg);
            be32(b, payload::BASE, base);
            be32(b, payload::OFFSET, offset);
            be32(b, payload::LEN, len);
        })
    }

    pub(crate) fn immediate_value_elem(dreg: u32, bytes: &[u8]) -> Vec<u8> {
        elem("immediate", |b| {
            be32(b, immediate::DREG, dreg);
            value(b, immediate::DATA, bytes);
        })
    }

    pub(crate) fn jump_elem(chain_name: &str) -> Vec<u8> {
        elem("immediate", |b| {
            be32(b, immediate::DREG, 0);
            b.extend(nest(immediate::DATA, |d| {
                d.extend(nest(data::VERDICT, |v| {
                    push_attr(v, data::VERDICT_CODE, &(-3i32).to_be_bytes());
                    let mut c = chain_name.as_bytes().to_vec();
                    c.push(0);
                    push_attr(v, data::VERDICT_CHAIN, &c);
                }));
            }));
        })
    }

    pub(crate) fn dnat_elem(family: u32, addr_reg: u32, proto_reg: u32) -> Vec<u8> {
        elem("nat", |b| {
            be32(b, nat::TYPE, nat::DNAT);
            be32(b, nat::FAMILY, family);
            be32(b, nat::REG_ADDR_MIN, addr_reg);
            be32(b, nat::REG_PROTO_MIN, proto_reg);
        })
    }

    /// A complete rule payload (nfgenmsg + attributes).
    pub(crate) fn rule_payload(family: u8, table_name: &str, chain_name: &str, elems: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = NfGenMsg::with_family(family).as_bytes().to_vec();
        let mut t = table_name.as_bytes().to_vec();
        t.push(0);
        push_attr(&mut buf, rule::TABLE, &t);
        let mut c = chain_name.as_bytes().to_vec();
        c.push(0);
        push_attr(&mut buf, rule::CHAIN, &c);
        push_attr(&mut buf, rule::HANDLE, &7u64.to_be_bytes());
        let list: Vec<u8> = elems.concat();
        push_attr(&mut buf, rule::EXPRESSIONS | 0x8000, &list);
        buf
    }

    #[test]
    fn decodes_rule_expressions() {
        let payload = rule_payload(
            2,
            "nat",
            "DOCKER",
            &[
                meta_elem(1, meta_key::L4PROTO),
                cmp_elem(1, &[6]),
                payload_elem(1, 2, 2, 2),
                cmp_elem(1, &8080u16.to_be_bytes()),
                immediate_value_elem(1, &[10, 0, 0, 5]),
                immediate_value_elem(2, &80u16.to_be_bytes()),
                dnat_elem(2, 1, 2),
                elem("counter", |_| {}),
            ],
        );

        let msg = RuleMessage::from_bytes(&payload).unwrap();
        assert_eq!(msg.family, 2);
        assert_eq!(msg.table, "nat");
        assert_eq!(msg.chain, "DOCKER");
        assert_eq!(msg.handle, 7);
        assert_eq!(msg.exprs.len(), 8);
        assert_eq!(
            msg.exprs[0],
            Expr::Meta {
                dreg: 1,
                key: meta_key::L4PROTO
            }
        );
        assert_eq!(
            msg.exprs[2],
            Expr::Payload {
                dreg: 1,
                base: PayloadBase::Transport,
                offset: 2,
                len: 2
            }
        );
        assert!(matches!(
            msg.exprs[6],
            Expr::Nat {
                nat_type: 1,
                reg_addr_min: Some(1),
                reg_proto_min: Some(2),
                ..
            }
        ));
        assert_eq!(msg.exprs[7], Expr::Other("counter".into()));
    }

    #[test]
    fn decodes_jump_verdict() {
        let payload = rule_payload(2, "nat", "KUBE-SERVICES", &[jump_elem("KUBE-SVC-X")]);
        let msg = RuleMessage::from_bytes(&payload).unwrap();
        assert_eq!(
            msg.exprs[0],
            Expr::Immediate {
                dreg: 0,
                data: ImmediateData::Verdict {
                    code: -3,
                    chain: Some("KUBE-SVC-X".into())
                }
            }
        );
    }
}
