use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    str::FromStr,
};

use nom::{
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res},
    sequence::{delimited, separated_pair},
    IResult,
};
use serde::{Deserialize, Serialize};

/// Host and port of a skeleton's listening socket.
///
/// The host is kept as text so a stub can carry a hostname that only
/// resolves on the caller's side of the network.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    host: String,
    port: u16,
}

impl EndpointAddress {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the host is the unspecified address (`0.0.0.0` or `::`).
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.host
            .parse::<IpAddr>()
            .map(|ip| ip.is_unspecified())
            .unwrap_or(false)
    }

    /// Replaces a wildcard host with the loopback address of the same family.
    #[must_use]
    pub fn or_loopback(self) -> Self {
        match self.host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) if ip.is_unspecified() => {
                Self::new(Ipv4Addr::LOCALHOST.to_string(), self.port)
            }
            Ok(IpAddr::V6(ip)) if ip.is_unspecified() => {
                Self::new(Ipv6Addr::LOCALHOST.to_string(), self.port)
            }
            _ => self,
        }
    }
}

impl From<SocketAddr> for EndpointAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("invalid endpoint address `{0}`, expected host:port or [ipv6]:port")]
pub struct AddressParseError(String);

impl FromStr for EndpointAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match all_consuming(parse_endpoint)(s) {
            Ok((_, (host, port))) => Ok(Self::new(host, port)),
            Err(_) => Err(AddressParseError(s.to_string())),
        }
    }
}

fn parse_endpoint(input: &str) -> IResult<&str, (&str, u16)> {
    separated_pair(alt((parse_bracketed_host, parse_plain_host)), char(':'), parse_port)(input)
}

fn parse_bracketed_host(input: &str) -> IResult<&str, &str> {
    delimited(
        char('['),
        take_while1(|ch: char| ch.is_ascii_hexdigit() || ch == ':' || ch == '.'),
        char(']'),
    )(input)
}

fn parse_plain_host(input: &str) -> IResult<&str, &str> {
    take_while1(|ch: char| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_'))(input)
}

fn parse_port(input: &str) -> IResult<&str, u16> {
    map_res(digit1, str::parse::<u16>)(input)
}
