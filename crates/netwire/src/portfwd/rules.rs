//! nftables rule sets of one family, organised by table and chain.

use std::collections::BTreeMap;

use super::nfproto;
use crate::netlink::messages::{ChainMessage, RuleMessage, TableMessage};
use crate::netlink::{Connection, Result};
use crate::topology::Family;

#[derive(Debug, Clone, Default)]
pub struct Table {
    pub name: String,
    /// Rules per chain, in dump (evaluation) order.
    pub chains: BTreeMap<String, Vec<RuleMessage>>,
}

impl Table {
    pub fn chain(&self, name: &str) -> Option<&[RuleMessage]> {
        self.chains.get(name).map(Vec::as_slice)
    }

    pub fn rules(&self) -> impl Iterator<Item = &RuleMessage> {
        self.chains.values().flatten()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub tables: BTreeMap<String, Table>,
}

impl RuleSet {
    /// Assemble a rule set from dumped messages of a single family. Chains
    /// and rules of tables that were not dumped are dropped.
    pub fn from_messages(tables: Vec<TableMessage>, chains: Vec<ChainMessage>, rules: Vec<RuleMessage>) -> Self {
        let mut set = RuleSet::default();
        for t in tables {
            set.tables.insert(
                t.name.clone(),
                Table {
                    name: t.name,
                    chains: BTreeMap::new(),
                },
            );
        }
        for c in chains {
            if let Some(table) = set.tables.get_mut(&c.table) {
                table.chains.entry(c.name).or_default();
            }
        }
        for r in rules {
            match set.tables.get_mut(&r.table) {
                Some(table) => table.chains.entry(r.chain.clone()).or_default().push(r),
                None => tracing::trace!(table = %r.table, "rule of unknown table"),
            }
        }
        set
    }

    /// Dump all tables, chains and rules of `family`.
    pub async fn fetch(conn: &Connection, family: Family) -> Result<Self> {
        let nf = nfproto(family);
        let tables = conn.get_nft_tables(nf).await?;
        let chains = conn.get_nft_chains(nf).await?;
        let rules = conn.get_nft_rules(nf).await?;
        Ok(Self::from_messages(
            tables.into_iter().filter(|t| t.family == nf).collect(),
            chains.into_iter().filter(|c| c.family == nf).collect(),
            rules.into_iter().filter(|r| r.family == nf).collect(),
        ))
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn rule_count(&self) -> usize {
        self.tables.values().map(|t| t.rules().count()).sum()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::netlink::FromNetlink;
    use crate::netlink::messages::nftables::tests::rule_payload;

    /// Rule set of a single `nat` table from `(chain, expression elems)`.
    pub(crate) fn nat_rules(family: u8, rules: &[(&str, Vec<Vec<u8>>)]) -> RuleSet {
        let tables = vec![TableMessage {
            family,
            name: "nat".into(),
        }];
        let msgs = rules
            .iter()
            .map(|(chain, elems)| RuleMessage::from_bytes(&rule_payload(family, "nat", chain, elems)).unwrap())
            .collect();
        RuleSet::from_messages(tables, Vec::new(), msgs)
    }

    #[test]
    fn groups_rules_by_table_and_chain() {
        let tables = vec![TableMessage {
            family: 2,
            name: "nat".into(),
        }];
        let chains = vec![
            ChainMessage {
                family: 2,
                table: "nat".into(),
                name: "PREROUTING".into(),
            },
            ChainMessage {
                family: 2,
                table: "filter".into(),
                name: "INPUT".into(),
            },
        ];
        let rules = vec![
            RuleMessage {
                family: 2,
                table: "nat".into(),
                chain: "DOCKER".into(),
                handle: 1,
                exprs: Vec::new(),
            },
            RuleMessage {
                family: 2,
                table: "filter".into(),
                chain: "INPUT".into(),
                handle: 2,
                exprs: Vec::new(),
            },
        ];
        let set = RuleSet::from_messages(tables, chains, rules);
        let nat = set.table("nat").unwrap();
        assert!(nat.chain("PREROUTING").unwrap().is_empty());
        assert_eq!(nat.chain("DOCKER").unwrap().len(), 1);
        assert!(set.table("filter").is_none());
        assert_eq!(set.rule_count(), 1);
    }
}
