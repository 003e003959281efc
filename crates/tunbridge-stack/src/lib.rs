//! Host-side façade over an external packet-engine.
//!
//! This crate is the boundary layer between host glue and a packet-level
//! network stack engine reached through the flat call surface in
//! [`tunbridge_engine`]. It owns the handle-indexed socket registry, enforces
//! the configure-then-finalize lifecycle, queues outbound blocks until they
//! cross the boundary, and forwards the driving operations (`poll`, `spin`,
//! `phy_wait`) that make the otherwise inert engine progress.
//!
//! The engine itself — protocol state machines, routing, checksums — lives
//! behind [`tunbridge_engine::PacketEngine`] and is out of scope here.
#![forbid(unsafe_code)]

mod config;
mod error;
mod ports;
mod registry;
mod socket;
mod stack;

pub use config::StackConfig;
pub use error::{Result, StackError};
pub use ports::{PortSource, RandomPorts, EPHEMERAL_RANGE};
pub use registry::HandleRegistry;
pub use socket::SocketDescriptor;
pub use stack::Stack;
