//! Netlink connection with request/response and dump handling.

use std::os::unix::io::RawFd;

use super::builder::MessageBuilder;
use super::error::{Error, Result};
use super::message::{MessageIter, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgError, NlMsgType};
use super::messages::{AddressMessage, LinkMessage, NsIdMessage, RouteMessage};
use super::parse::FromNetlink;
use super::socket::{NetlinkSocket, Protocol};
use super::types::addr::IfAddrMsg;
use super::types::nsid::{RtGenMsg, netnsa};
use super::types::route::RtMsg;

/// Netlink connection.
///
/// Bound to the namespace its socket was created in; the thread that drives
/// it may be anywhere.
pub struct Connection {
    socket: NetlinkSocket,
}

impl Connection {
    /// Connection in the calling thread's namespace.
    pub fn new(protocol: Protocol) -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new(protocol)?,
        })
    }

    /// Connection in the namespace behind `ns_fd`.
    pub fn new_in_namespace(protocol: Protocol, ns_fd: RawFd) -> Result<Self> {
        Ok(Self {
            socket: NetlinkSocket::new_in_namespace(protocol, ns_fd)?,
        })
    }

    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    /// Send a request and return the datagram holding the reply.
    pub async fn request(&self, mut builder: MessageBuilder) -> Result<Vec<u8>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        self.socket.send(&builder.finish()).await?;

        loop {
            let response = self.socket.recv_msg().await?;
            if check_response(&response, seq)? {
                return Ok(response);
            }
        }
    }

    /// Send a dump request and collect every reply message (header included).
    pub async fn dump(&self, mut builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        self.socket.send(&builder.finish()).await?;

        let mut responses = Vec::new();
        loop {
            let data = self.socket.recv_msg().await?;
            let mut offset = 0;

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;
                let start = offset;
                offset += super::message::nlmsg_align(header.nlmsg_len as usize);

                if header.nlmsg_seq != seq {
                    continue;
                }

                if header.is_error() {
                    let err = NlMsgError::from_bytes(payload)?;
                    if !err.is_ack() {
                        return Err(Error::from_errno(err.error));
                    }
                    continue;
                }

                if header.is_done() {
                    return Ok(responses);
                }

                let end = start + header.nlmsg_len as usize;
                if let Some(msg) = data.get(start..end) {
                    responses.push(msg.to_vec());
                }
            }
        }
    }

    /// Dump and parse into typed messages, dropping undecodable ones.
    pub async fn dump_typed<T: FromNetlink>(&self, msg_type: u16) -> Result<Vec<T>> {
        let mut builder = dump_request(msg_type);

        let mut header_buf = Vec::new();
        T::write_dump_header(&mut header_buf);
        builder.append_bytes(&header_buf);

        self.dump_parsed(builder).await
    }

    pub(crate) async fn dump_parsed<T: FromNetlink>(&self, builder: MessageBuilder) -> Result<Vec<T>> {
        let responses = self.dump(builder).await?;

        let mut parsed = Vec::with_capacity(responses.len());
        for response in responses {
            let Some(payload) = response.get(NLMSG_HDRLEN..) else {
                continue;
            };
            match T::from_bytes(payload) {
                Ok(msg) => parsed.push(msg),
                Err(e) => tracing::trace!("dropping undecodable message: {e}"),
            }
        }

        Ok(parsed)
    }

    // ========================================================================
    // RTNETLINK queries
    // ========================================================================

    pub async fn get_links(&self) -> Result<Vec<LinkMessage>> {
        self.dump_typed(NlMsgType::RTM_GETLINK)
            .await
            .map_err(|e| e.with_context("dumping links"))
    }

    /// Addresses of one family (`AF_INET`/`AF_INET6`).
    pub async fn get_addresses(&self, family: u8) -> Result<Vec<AddressMessage>> {
        let mut builder = dump_request(NlMsgType::RTM_GETADDR);
        builder.append_bytes(IfAddrMsg::with_family(family).as_bytes());
        let addrs: Vec<AddressMessage> = self
            .dump_parsed(builder)
            .await
            .map_err(|e| e.with_context("dumping addresses"))?;
        Ok(addrs.into_iter().filter(|a| a.family() == family).collect())
    }

    /// Routes of one family, across all tables.
    pub async fn get_routes(&self, family: u8) -> Result<Vec<RouteMessage>> {
        let mut builder = dump_request(NlMsgType::RTM_GETROUTE);
        builder.append_bytes(RtMsg::with_family(family).as_bytes());
        let routes: Vec<RouteMessage> = self
            .dump_parsed(builder)
            .await
            .map_err(|e| e.with_context("dumping routes"))?;
        Ok(routes.into_iter().filter(|r| r.family() == family).collect())
    }

    /// NSID this connection's namespace has assigned to the namespace behind
    /// `ns_fd`. `Ok(None)` when the kernel reports no assigned id.
    pub async fn get_nsid(&self, ns_fd: RawFd) -> Result<Option<u32>> {
        let mut builder = MessageBuilder::new(NlMsgType::RTM_GETNSID, NLM_F_REQUEST);
        builder.append_bytes(RtGenMsg::default().as_bytes());
        builder.append_attr_u32(netnsa::FD, ns_fd as u32);

        let response = self
            .request(builder)
            .await
            .map_err(|e| e.with_context("querying nsid"))?;

        for result in MessageIter::new(&response) {
            let (header, payload) = result?;
            if header.nlmsg_type == NlMsgType::RTM_NEWNSID {
                return Ok(NsIdMessage::parse(payload).and_then(|m| m.assigned()));
            }
        }

        Err(Error::InvalidMessage(
            "namespace ID not found in response".into(),
        ))
    }
}

/// Whether a datagram answers `seq`; kernel errors are surfaced.
fn check_response(data: &[u8], seq: u32) -> Result<bool> {
    let mut matched = false;
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != seq {
            continue;
        }
        matched = true;

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if !err.is_ack() {
                return Err(Error::from_errno(err.error));
            }
        }
    }
    Ok(matched)
}

/// Build a dump request.
pub fn dump_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP)
}
