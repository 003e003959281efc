//! Address, CIDR and endpoint value types crossing the boundary.
//!
//! These are plain value types with no ownership concerns; the engine receives
//! them by copy.

use core::fmt;
use core::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// A CIDR prefix length was outside the valid range for its address family.
///
/// This is a semantic construction error: it can occur at any point during
/// configuration and never depends on call ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid prefix length {prefix} (maximum {max})")]
pub struct InvalidPrefix {
    pub prefix: u8,
    pub max: u8,
}

/// An IPv4 address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, InvalidPrefix> {
        if prefix > 32 {
            return Err(InvalidPrefix { prefix, max: 32 });
        }
        Ok(Self { address, prefix })
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl fmt::Display for Ipv4Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// An IPv6 address plus prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv6Cidr {
    address: Ipv6Addr,
    prefix: u8,
}

impl Ipv6Cidr {
    pub fn new(address: Ipv6Addr, prefix: u8) -> Result<Self, InvalidPrefix> {
        if prefix > 128 {
            return Err(InvalidPrefix { prefix, max: 128 });
        }
        Ok(Self { address, prefix })
    }

    pub fn address(&self) -> Ipv6Addr {
        self.address
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }
}

impl fmt::Display for Ipv6Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

/// Destination (or source) of a datagram or stream payload.
///
/// The address part is optional: connected stream sockets already know their
/// peer, so sends on them pass an address-less endpoint. Datagram sends must
/// carry an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    addr: Option<IpAddr>,
    port: u16,
}

impl Endpoint {
    /// An endpoint with no address and port zero, for sends where the engine
    /// already knows the peer.
    pub const NONE: Endpoint = Endpoint {
        addr: None,
        port: 0,
    };

    pub fn v4(addr: Ipv4Addr, port: u16) -> Self {
        Self {
            addr: Some(IpAddr::V4(addr)),
            port,
        }
    }

    pub fn v6(addr: Ipv6Addr, port: u16) -> Self {
        Self {
            addr: Some(IpAddr::V6(addr)),
            port,
        }
    }

    pub fn addr(&self) -> Option<IpAddr> {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn has_addr(&self) -> bool {
        self.addr.is_some()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Some(IpAddr::V4(a)) => write!(f, "{}:{}", a, self.port),
            Some(IpAddr::V6(a)) => write!(f, "[{}]:{}", a, self.port),
            None => write!(f, "<none>:{}", self.port),
        }
    }
}
