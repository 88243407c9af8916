//! nf_tables dumps over a `Protocol::Netfilter` connection.
//!
//! ```ignore
//! use netwire::netlink::{Connection, Protocol};
//!
//! let conn = Connection::new(Protocol::Netfilter)?;
//! for rule in conn.get_nft_rules(libc::AF_INET as u8).await? {
//!     println!("{} {} {:?}", rule.table, rule.chain, rule.exprs);
//! }
//! ```

use super::builder::MessageBuilder;
use super::connection::{Connection, dump_request};
use super::error::Result;
use super::messages::{ChainMessage, RuleMessage, TableMessage};
use super::types::nftables::{NfGenMsg, nft_msg, nft_msg_type};

fn nft_dump(msg: u8, family: u8) -> MessageBuilder {
    let mut builder = dump_request(nft_msg_type(msg));
    builder.append_bytes(NfGenMsg::with_family(family).as_bytes());
    builder
}

impl Connection {
    /// Tables of one nfproto family.
    pub async fn get_nft_tables(&self, family: u8) -> Result<Vec<TableMessage>> {
        self.dump_parsed(nft_dump(nft_msg::GETTABLE, family))
            .await
            .map_err(|e| e.with_context("dumping nftables tables"))
    }

    /// Chains of one nfproto family, across all tables.
    pub async fn get_nft_chains(&self, family: u8) -> Result<Vec<ChainMessage>> {
        self.dump_parsed(nft_dump(nft_msg::GETCHAIN, family))
            .await
            .map_err(|e| e.with_context("dumping nftables chains"))
    }

    /// Rules of one nfproto family, across all tables and chains.
    pub async fn get_nft_rules(&self, family: u8) -> Result<Vec<RuleMessage>> {
        self.dump_parsed(nft_dump(nft_msg::GETRULE, family))
            .await
            .map_err(|e| e.with_context("dumping nftables rules"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::{NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgHdr};

    #[test]
    fn rule_dump_request_layout() {
        let msg = nft_dump(nft_msg::GETRULE, 10).finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_type, (10 << 8) | 7);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST | NLM_F_DUMP);
        assert_eq!(msg.len(), NLMSG_HDRLEN + NfGenMsg::SIZE);
        assert_eq!(msg[NLMSG_HDRLEN], 10);
    }
}
