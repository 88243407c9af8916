//! `/proc/net/{tcp,udp}{,6}` parsing.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::Path;

use super::Protocol;
use crate::topology::Family;

/// One row of a socket table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketRecord {
    pub local_ip: IpAddr,
    pub local_port: u16,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
    /// Raw kernel state code.
    pub state: u8,
    pub inode: u64,
}

/// Read the socket table of `protocol`/`family` as seen by process `pid`.
pub fn read_table(proc_root: &Path, pid: u32, protocol: Protocol, family: Family) -> std::io::Result<Vec<SocketRecord>> {
    let file = match family {
        Family::Ipv4 => protocol.name().to_string(),
        Family::Ipv6 => format!("{}6", protocol.name()),
    };
    let path = proc_root.join(pid.to_string()).join("net").join(file);
    Ok(parse_table(&std::fs::read_to_string(path)?, family))
}

/// Parse a socket table. The header line and undecodable rows are skipped.
pub fn parse_table(content: &str, family: Family) -> Vec<SocketRecord> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let record = parse_row(line, family);
            if record.is_none() && !line.trim().is_empty() {
                tracing::trace!(line, "dropping socket row");
            }
            record
        })
        .collect()
}

fn parse_row(line: &str, family: Family) -> Option<SocketRecord> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return None;
    }
    let (local_ip, local_port) = parse_endpoint(fields[1], family)?;
    let (remote_ip, remote_port) = parse_endpoint(fields[2], family)?;
    Some(SocketRecord {
        local_ip,
        local_port,
        remote_ip,
        remote_port,
        state: u8::from_str_radix(fields[3], 16).ok()?,
        inode: fields[9].parse().ok()?,
    })
}

/// `ADDR:PORT`; the address is printed as host-order 32-bit words, the port
/// in network order.
fn parse_endpoint(s: &str, family: Family) -> Option<(IpAddr, u16)> {
    let (addr, port) = s.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let ip = match family {
        Family::Ipv4 => {
            if addr.len() != 8 {
                return None;
            }
            let word = u32::from_str_radix(addr, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(word.to_ne_bytes()))
        }
        Family::Ipv6 => {
            if addr.len() != 32 {
                return None;
            }
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_exact_mut(4).enumerate() {
                let word = u32::from_str_radix(addr.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
    };
    Some((ip, port))
}
