//! Types and traits for the flat call boundary between host glue and an
//! external packet-processing engine.
//!
//! This crate is intentionally minimal: it defines the value types that cross
//! the boundary (addresses, endpoints, status bytes), the buffer-ownership
//! types that make the handoff single-owner in both directions, and the
//! [`PacketEngine`] trait that models the engine's flat call surface. The
//! engine itself (protocol state machines, routing, retransmission) lives
//! behind this trait and is not implemented here.
#![forbid(unsafe_code)]

mod addr;
mod block;
mod engine;

pub use addr::{Endpoint, InvalidPrefix, Ipv4Cidr, Ipv6Cidr};
pub use block::{AllocError, BlockAlloc, ReleaseHook, RxSlot, SystemAlloc, TxBlock};
pub use engine::{Millis, PacketEngine, SocketHandle};

use core::fmt;

/// Status byte returned by every engine call.
///
/// Zero is the universal success discriminator; any nonzero value is an
/// engine-defined rejection (queue full, not connected, ...). This layer does
/// not interpret individual nonzero codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct Status(pub u8);

impl Status {
    pub const OK: Status = Status(0);

    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    pub fn is_rejected(self) -> bool {
        self.0 != 0
    }

    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport protocol of a socket behind the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketKind {
    Tcp,
    Udp,
}

/// Kind of device the engine is attached to.
///
/// `VirtualTun` is a fully in-memory point-to-point transport; `Tun`/`Tap`
/// map to the corresponding host network devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    VirtualTun,
    Tun,
    Tap,
}
