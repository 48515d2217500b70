use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("{0:?} is not a valid IPv4 or IPv6 address")]
pub struct IpParseError(String);

/// Canonical form of a user-entered IP address.
///
/// IPv4-mapped IPv6 addresses compare and display as plain IPv4, so
/// `::ffff:8.8.8.8` and `8.8.8.8` name the same bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NormalizedIp(IpAddr);

impl NormalizedIp {
    pub fn addr(&self) -> IpAddr {
        self.0
    }
}

// Replace with IpAddr::to_canonical once it stabilizes
// https://github.com/rust-lang/rust/issues/27709
fn to_canonical_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(v4) => IpAddr::V4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
    }
}

impl From<IpAddr> for NormalizedIp {
    fn from(addr: IpAddr) -> Self {
        Self(to_canonical_ip(addr))
    }
}

impl FromStr for NormalizedIp {
    type Err = IpParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>()
            .map(Self::from)
            .map_err(|_| IpParseError(s.to_owned()))
    }
}

impl TryFrom<String> for NormalizedIp {
    type Error = IpParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<NormalizedIp> for String {
    fn from(ip: NormalizedIp) -> Self {
        ip.to_string()
    }
}

impl fmt::Display for NormalizedIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ipv4() {
        let ip: NormalizedIp = "8.8.8.8".parse().unwrap();
        assert_eq!(ip.to_string(), "8.8.8.8");
    }

    #[test]
    fn parse_ipv6_compresses() {
        let ip: NormalizedIp = "2001:0db8:0000:0000:0000:0000:0000:0001".parse().unwrap();
        assert_eq!(ip.to_string(), "2001:db8::1");
    }

    #[test]
    fn ipv4_mapped_ipv6_equals_ipv4() {
        let mapped: NormalizedIp = "::ffff:8.8.8.8".parse().unwrap();
        let plain: NormalizedIp = "8.8.8.8".parse().unwrap();
        assert_eq!(mapped, plain);
        assert_eq!(mapped.to_string(), "8.8.8.8");
    }

    #[test]
    fn rejects_garbage() {
        for s in ["", "8.8.8", "256.1.1.1", "example.com", "8.8.8.8 "] {
            assert!(s.parse::<NormalizedIp>().is_err(), "{s:?} should be rejected");
        }
    }

    #[test]
    fn serde_round_trip_as_string() {
        let ip: NormalizedIp = "::ffff:1.1.1.1".parse().unwrap();
        let json = serde_json::to_string(&ip).unwrap();
        assert_eq!(json, r#""1.1.1.1""#);
        let back: NormalizedIp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ip);
    }
}
