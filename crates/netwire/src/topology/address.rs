//! Assigned interface addresses.

use std::cmp::Ordering;
use std::fmt;
use std::net::IpAddr;

use crate::netlink::messages::AddressMessage;

/// IP address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
#[cfg_attr(feature = "output", serde(rename_all = "lowercase"))]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    pub fn of(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => Self::Ipv4,
            IpAddr::V6(_) => Self::Ipv6,
        }
    }

    /// The unspecified address of this family.
    pub fn unspecified(self) -> IpAddr {
        match self {
            Self::Ipv4 => IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            Self::Ipv6 => IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => f.write_str("IPv4"),
            Self::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// An address assigned to an interface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "output", derive(serde::Serialize))]
pub struct Address {
    pub family: Family,
    pub ip: IpAddr,
    pub prefix_len: u8,
    pub scope: u8,
    pub preferred_lifetime: u32,
    pub valid_lifetime: u32,
    /// Index of the interface the address is assigned to.
    pub index: u32,
}

impl Address {
    pub fn new(ip: IpAddr, prefix_len: u8, index: u32) -> Self {
        Self {
            family: Family::of(&ip),
            ip,
            prefix_len,
            scope: 0,
            preferred_lifetime: u32::MAX,
            valid_lifetime: u32::MAX,
            index,
        }
    }

    pub(crate) fn from_message(msg: &AddressMessage) -> Option<Self> {
        let ip = msg.address()?;
        Some(Self {
            family: Family::of(&ip),
            ip,
            prefix_len: msg.prefix_len(),
            scope: msg.scope(),
            preferred_lifetime: msg.preferred_lifetime(),
            valid_lifetime: msg.valid_lifetime(),
            index: msg.index(),
        })
    }

    /// Whether `ip` lies inside this address's subnet.
    pub fn contains(&self, ip: &IpAddr) -> bool {
        prefix_matches(&self.ip, self.prefix_len, ip)
    }
}

/// Family, then address, then prefix length. The remaining fields only
/// break ties so that ordering agrees with equality.
impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.family
            .cmp(&other.family)
            .then_with(|| exploded(&self.ip).cmp(&exploded(&other.ip)))
            .then_with(|| self.prefix_len.cmp(&other.prefix_len))
            .then_with(|| self.index.cmp(&other.index))
            .then_with(|| self.scope.cmp(&other.scope))
            .then_with(|| self.preferred_lifetime.cmp(&other.preferred_lifetime))
            .then_with(|| self.valid_lifetime.cmp(&other.valid_lifetime))
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

/// Fixed-width textual form that sorts like the numeric value:
/// `010.000.000.005`, or eight four-digit hex groups for IPv6.
pub fn exploded(ip: &IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{a:03}.{b:03}.{c:03}.{d:03}")
        }
        IpAddr::V6(v6) => v6
            .segments()
            .iter()
            .map(|s| format!("{s:04x}"))
            .collect::<Vec<_>>()
            .join(":"),
    }
}

/// Whether `candidate` shares the first `prefix_len` bits with `network`.
/// Addresses of different families never match.
pub fn prefix_matches(network: &IpAddr, prefix_len: u8, candidate: &IpAddr) -> bool {
    match (network, candidate) {
        (IpAddr::V4(n), IpAddr::V4(c)) => {
            let bits = u32::from(prefix_len.min(32));
            let mask = u32::MAX.checked_shl(32 - bits).unwrap_or(0);
            u32::from(*n) & mask == u32::from(*c) & mask
        }
        (IpAddr::V6(n), IpAddr::V6(c)) => {
            let bits = u32::from(prefix_len.min(128));
            let mask = u128::MAX.checked_shl(128 - bits).unwrap_or(0);
            u128::from(*n) & mask == u128::from(*c) & mask
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str, prefix: u8) -> Address {
        Address::new(s.parse().unwrap(), prefix, 1)
    }

    #[test]
    fn sorts_v4_first_then_exploded_then_prefix() {
        let mut addrs = vec![
            addr("127.0.0.100", 24),
            addr("fe80::1", 64),
            addr("127.0.0.20", 16),
        ];
        addrs.sort();
        let shown: Vec<_> = addrs.iter().map(ToString::to_string).collect();
        assert_eq!(shown, ["127.0.0.20/16", "127.0.0.100/24", "fe80::1/64"]);
    }

    #[test]
    fn prefix_breaks_ties() {
        let mut addrs = vec![addr("10.0.0.1", 24), addr("10.0.0.1", 8)];
        addrs.sort();
        assert_eq!(addrs[0].prefix_len, 8);
    }

    #[test]
    fn ordering_agrees_with_equality() {
        let a = addr("10.0.0.1", 24);
        let b = Address {
            valid_lifetime: 600,
            ..a.clone()
        };
        assert_ne!(a, b);
        assert_ne!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.cmp(&a.clone()), Ordering::Equal);
        // the displayed order is unaffected by lifetimes
        assert!(addr("10.0.0.1", 8) < b);
    }

    #[test]
    fn exploded_forms() {
        assert_eq!(exploded(&"10.0.0.5".parse().unwrap()), "010.000.000.005");
        assert_eq!(
            exploded(&"fe80::1".parse().unwrap()),
            "fe80:0000:0000:0000:0000:0000:0000:0001"
        );
    }

    #[test]
    fn subnet_membership() {
        let lo = addr("127.0.0.1", 8);
        assert!(lo.contains(&"127.1.2.3".parse().unwrap()));
        assert!(!lo.contains(&"10.0.0.1".parse().unwrap()));
        assert!(!lo.contains(&"::1".parse().unwrap()));
        assert!(prefix_matches(
            &"0.0.0.0".parse().unwrap(),
            0,
            &"203.0.113.1".parse().unwrap()
        ));
        assert!(prefix_matches(
            &"2001:db8::".parse().unwrap(),
            32,
            &"2001:db8:1::5".parse().unwrap()
        ));
    }
}
