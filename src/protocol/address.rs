//! Target address classification and encoding.

use std::fmt;
use std::str::FromStr;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::{ATYP_DOMAIN, ATYP_IPV4, MAX_SHORT_FIELD};

/// Destination the proxy should connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetAddress {
    /// Hostname or dotted IPv4 literal
    pub host: String,
    /// TCP port
    pub port: u16,
}

/// Wire representation chosen for a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind<'a> {
    /// Four raw octets
    Ipv4([u8; 4]),
    /// Length-prefixed host text
    Domain(&'a str),
}

impl<'a> AddressKind<'a> {
    /// Classify a host string.
    ///
    /// Exactly four dot-separated decimal components, each in `0..=255`,
    /// select the IPv4 literal. Anything else is a domain name.
    pub fn classify(host: &'a str) -> Self {
        match parse_ipv4_literal(host) {
            Some(octets) => AddressKind::Ipv4(octets),
            None => AddressKind::Domain(host),
        }
    }

    /// Address type tag for this representation.
    pub fn atyp(&self) -> u8 {
        match self {
            AddressKind::Ipv4(_) => ATYP_IPV4,
            AddressKind::Domain(_) => ATYP_DOMAIN,
        }
    }

    /// Size of the address block including the type tag.
    pub fn encoded_len(&self) -> usize {
        match self {
            AddressKind::Ipv4(_) => 1 + 4,
            AddressKind::Domain(host) => 1 + 1 + host.len(),
        }
    }

    /// Append `atyp | addr` to `buf`.
    ///
    /// The domain length must already have been checked against the one-byte
    /// prefix.
    pub(crate) fn put(&self, buf: &mut impl BufMut) {
        buf.put_u8(self.atyp());
        match self {
            AddressKind::Ipv4(octets) => buf.put_slice(octets),
            AddressKind::Domain(host) => {
                buf.put_u8(host.len() as u8);
                buf.put_slice(host.as_bytes());
            }
        }
    }
}

fn parse_ipv4_literal(host: &str) -> Option<[u8; 4]> {
    let mut octets = [0u8; 4];
    let mut parts = host.split('.');

    for octet in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value: u32 = part.parse().ok()?;
        *octet = u8::try_from(value).ok()?;
    }

    if parts.next().is_some() {
        return None;
    }

    Some(octets)
}

impl TargetAddress {
    /// Create a new target address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Classify the host. Recomputed on every call.
    pub fn kind(&self) -> AddressKind<'_> {
        AddressKind::classify(&self.host)
    }

    /// Check that the host fits the one-byte domain length prefix.
    pub fn validate(&self) -> Result<()> {
        if let AddressKind::Domain(host) = self.kind() {
            if host.len() > MAX_SHORT_FIELD {
                return Err(Error::malformed("host", host.len(), MAX_SHORT_FIELD));
            }
        }
        Ok(())
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for TargetAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::config(format!("missing port in target address: {}", s)))?;
        if host.is_empty() {
            return Err(Error::config(format!("missing host in target address: {}", s)));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::config(format!("invalid port in target address {}: {}", s, e)))?;
        Ok(Self::new(host, port))
    }
}
