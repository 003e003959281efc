//! The engine's flat call surface.

use core::net::{Ipv4Addr, Ipv6Addr};

use crate::{BlockAlloc, Endpoint, Ipv4Cidr, Ipv6Cidr, RxSlot, SocketKind, Status, TxBlock};

/// Milliseconds, the time unit used across the boundary.
pub type Millis = u64;

/// Opaque correlation key identifying a socket across the boundary.
///
/// Handles are allocated host-side, strictly increasing and never reused; the
/// engine treats them as opaque.
pub type SocketHandle = u64;

/// The flat call surface of the external packet-processing engine.
///
/// Every method mirrors one boundary call: flat arguments, a [`Status`] byte
/// for anything that can be rejected. Implementations perform no background
/// work of their own; the host drives them through [`poll`](Self::poll) and
/// the wait operations. None of the methods are reentrant — a single engine
/// instance must be driven from one thread at a time.
///
/// Dropping an engine must release every resource it holds: sockets, queued
/// blocks (firing their release hooks), and the underlying device.
pub trait PacketEngine {
    // Configuration. Valid only before `finalize` succeeds; the host façade
    // enforces the ordering and the engine may assume it.

    fn add_socket(&mut self, kind: SocketKind, handle: SocketHandle) -> Status;
    fn add_ipv4_address(&mut self, cidr: Ipv4Cidr) -> Status;
    fn add_ipv6_address(&mut self, cidr: Ipv6Cidr) -> Status;
    fn add_default_v4_gateway(&mut self, gateway: Ipv4Addr) -> Status;
    fn add_default_v6_gateway(&mut self, gateway: Ipv6Addr) -> Status;

    /// Commit the configuration. A rejection means the configuration was
    /// incomplete (e.g. no addresses) and the engine remains configurable.
    fn finalize(&mut self) -> Status;

    // Data plane.

    fn connect_v4(
        &mut self,
        handle: SocketHandle,
        addr: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Status;

    fn connect_v6(
        &mut self,
        handle: SocketHandle,
        addr: Ipv6Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Status;

    /// Take ownership of `block` for transmission.
    ///
    /// The block is consumed whether the send is accepted or rejected; its
    /// release hook fires when the engine is done with the bytes (on the
    /// rejection path, immediately).
    fn send(&mut self, handle: SocketHandle, block: TxBlock, endpoint: Endpoint) -> Status;

    /// Copy-variant send: the engine copies what it needs before returning,
    /// so the caller may reuse `bytes` immediately.
    fn send_copy(&mut self, handle: SocketHandle, bytes: &[u8], endpoint: Endpoint) -> Status;

    /// Non-blocking receive.
    ///
    /// When a block is pending, the engine allocates storage through `alloc`
    /// (exactly once, with the exact block size), fills it, places it in
    /// `slot` and returns [`Status::OK`]. Otherwise it returns a nonzero
    /// status, leaves `slot` empty and never invokes `alloc`.
    fn receive(
        &mut self,
        handle: SocketHandle,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status;

    // Lifecycle / driving.

    /// One non-blocking advance of engine state: timers, retransmits, queued
    /// I/O. The engine is inert between calls.
    fn poll(&mut self) -> Status;

    /// Block until `handle` reaches a state change or `timeout_ms` elapses.
    fn spin(&mut self, handle: SocketHandle, timeout_ms: Millis) -> Status;

    /// [`spin`](Self::spin) over every socket.
    fn spin_all(&mut self, timeout_ms: Millis) -> Status;

    /// Yield the calling thread until the engine's next scheduled deadline or
    /// external I/O readiness, whichever comes first, bounded by
    /// `deadline_ms`.
    fn phy_wait(&mut self, deadline_ms: Millis);

    // Virtual point-to-point transport. Only meaningful when the engine was
    // built over the in-memory device.

    /// Inject a raw frame into the engine from the outside of the virtual
    /// device. The engine copies the frame before returning.
    fn virtual_tun_send(&mut self, frame: &[u8]) -> Status;

    /// Block until a frame leaves the virtual device, then deliver it through
    /// the same allocator protocol as [`receive`](Self::receive).
    fn virtual_tun_receive_wait(
        &mut self,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status;

    /// Non-blocking variant of
    /// [`virtual_tun_receive_wait`](Self::virtual_tun_receive_wait).
    fn virtual_tun_receive_instantly(
        &mut self,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status;
}

impl<T: PacketEngine + ?Sized> PacketEngine for Box<T> {
    fn add_socket(&mut self, kind: SocketKind, handle: SocketHandle) -> Status {
        <T as PacketEngine>::add_socket(&mut **self, kind, handle)
    }

    fn add_ipv4_address(&mut self, cidr: Ipv4Cidr) -> Status {
        <T as PacketEngine>::add_ipv4_address(&mut **self, cidr)
    }

    fn add_ipv6_address(&mut self, cidr: Ipv6Cidr) -> Status {
        <T as PacketEngine>::add_ipv6_address(&mut **self, cidr)
    }

    fn add_default_v4_gateway(&mut self, gateway: Ipv4Addr) -> Status {
        <T as PacketEngine>::add_default_v4_gateway(&mut **self, gateway)
    }

    fn add_default_v6_gateway(&mut self, gateway: Ipv6Addr) -> Status {
        <T as PacketEngine>::add_default_v6_gateway(&mut **self, gateway)
    }

    fn finalize(&mut self) -> Status {
        <T as PacketEngine>::finalize(&mut **self)
    }

    fn connect_v4(
        &mut self,
        handle: SocketHandle,
        addr: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Status {
        <T as PacketEngine>::connect_v4(&mut **self, handle, addr, src_port, dst_port)
    }

    fn connect_v6(
        &mut self,
        handle: SocketHandle,
        addr: Ipv6Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Status {
        <T as PacketEngine>::connect_v6(&mut **self, handle, addr, src_port, dst_port)
    }

    fn send(&mut self, handle: SocketHandle, block: TxBlock, endpoint: Endpoint) -> Status {
        <T as PacketEngine>::send(&mut **self, handle, block, endpoint)
    }

    fn send_copy(&mut self, handle: SocketHandle, bytes: &[u8], endpoint: Endpoint) -> Status {
        <T as PacketEngine>::send_copy(&mut **self, handle, bytes, endpoint)
    }

    fn receive(
        &mut self,
        handle: SocketHandle,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status {
        <T as PacketEngine>::receive(&mut **self, handle, slot, alloc)
    }

    fn poll(&mut self) -> Status {
        <T as PacketEngine>::poll(&mut **self)
    }

    fn spin(&mut self, handle: SocketHandle, timeout_ms: Millis) -> Status {
        <T as PacketEngine>::spin(&mut **self, handle, timeout_ms)
    }

    fn spin_all(&mut self, timeout_ms: Millis) -> Status {
        <T as PacketEngine>::spin_all(&mut **self, timeout_ms)
    }

    fn phy_wait(&mut self, deadline_ms: Millis) {
        <T as PacketEngine>::phy_wait(&mut **self, deadline_ms)
    }

    fn virtual_tun_send(&mut self, frame: &[u8]) -> Status {
        <T as PacketEngine>::virtual_tun_send(&mut **self, frame)
    }

    fn virtual_tun_receive_wait(
        &mut self,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status {
        <T as PacketEngine>::virtual_tun_receive_wait(&mut **self, slot, alloc)
    }

    fn virtual_tun_receive_instantly(
        &mut self,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status {
        <T as PacketEngine>::virtual_tun_receive_instantly(&mut **self, slot, alloc)
    }
}
