//! The host-side stack façade.

use core::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use tracing::{debug, trace};
use tunbridge_engine::{
    BlockAlloc, Endpoint, Ipv4Cidr, Ipv6Cidr, Millis, PacketEngine, ReleaseHook, RxSlot,
    SocketHandle, SocketKind, Status, SystemAlloc, TxBlock,
};

use crate::config::StackConfig;
use crate::error::{Result, StackError};
use crate::ports::{PortSource, RandomPorts};
use crate::registry::HandleRegistry;
use crate::socket::SocketDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Configuring,
    Finalized,
}

/// One running engine instance plus everything the host tracks about it.
///
/// The lifecycle is linear: the stack is created in a configuring state,
/// [`finalize`](Stack::finalize) commits the configuration, and dropping the
/// stack releases the engine together with every handle and buffer it still
/// holds. There are no return edges.
///
/// The stack creates no threads and the engine performs no background work;
/// the host must drive it through [`poll`](Stack::poll) and the wait
/// operations, from a single thread. Neither the driving operations nor the
/// per-handle send/receive calls are safe for concurrent invocation on one
/// stack; multi-threaded hosts serialize access in front of it.
pub struct Stack {
    cfg: StackConfig,
    engine: Box<dyn PacketEngine>,
    registry: HandleRegistry,
    phase: Phase,
    ports: Box<dyn PortSource>,
}

impl Stack {
    /// Wrap an opened engine instance. The engine must be freshly constructed
    /// and not yet finalized.
    pub fn new(cfg: StackConfig, engine: Box<dyn PacketEngine>) -> Self {
        let ports = Box::new(RandomPorts::new(cfg.ephemeral_ports.clone()));
        Self::with_port_source(cfg, engine, ports)
    }

    /// Like [`Stack::new`] with an explicit port source, for deterministic
    /// hosts and tests.
    pub fn with_port_source(
        cfg: StackConfig,
        engine: Box<dyn PacketEngine>,
        ports: Box<dyn PortSource>,
    ) -> Self {
        Self {
            cfg,
            engine,
            registry: HandleRegistry::new(),
            phase: Phase::Configuring,
            ports,
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.cfg
    }

    pub fn is_finalized(&self) -> bool {
        self.phase == Phase::Finalized
    }

    /// Number of sockets allocated over the stack's lifetime and still
    /// registered.
    pub fn socket_count(&self) -> usize {
        self.registry.len()
    }

    /// Draw a source port from the configured range.
    pub fn ephemeral_port(&mut self) -> u16 {
        self.ports.next_port()
    }

    /// Look up the descriptor for a handle.
    pub fn socket(&self, handle: SocketHandle) -> Result<&SocketDescriptor> {
        self.registry.get(handle)
    }

    // --- configuration -----------------------------------------------------

    /// Allocate a handle and register a socket of the given kind with the
    /// engine.
    pub fn add_socket(&mut self, kind: SocketKind) -> Result<SocketHandle> {
        self.ensure_configuring()?;
        let handle = self
            .registry
            .allocate(kind, self.cfg.max_pending_sends_per_socket)?;
        let status = self.engine.add_socket(kind, handle);
        if status.is_rejected() {
            // The handle number stays burned; only the descriptor goes away.
            self.registry.discard(handle);
            debug!(handle, %status, "engine rejected socket registration");
            return Err(StackError::EngineRejected {
                op: "add_socket",
                status,
            });
        }
        Ok(handle)
    }

    pub fn add_ipv4_address(&mut self, cidr: Ipv4Cidr) -> Result<()> {
        self.ensure_configuring()?;
        check("add_ipv4_address", self.engine.add_ipv4_address(cidr))
    }

    pub fn add_ipv6_address(&mut self, cidr: Ipv6Cidr) -> Result<()> {
        self.ensure_configuring()?;
        check("add_ipv6_address", self.engine.add_ipv6_address(cidr))
    }

    pub fn set_default_v4_gateway(&mut self, gateway: Ipv4Addr) -> Result<()> {
        self.ensure_configuring()?;
        check(
            "add_default_v4_gateway",
            self.engine.add_default_v4_gateway(gateway),
        )
    }

    pub fn set_default_v6_gateway(&mut self, gateway: Ipv6Addr) -> Result<()> {
        self.ensure_configuring()?;
        check(
            "add_default_v6_gateway",
            self.engine.add_default_v6_gateway(gateway),
        )
    }

    /// Commit the configuration. On success the stack moves to the finalized
    /// phase and configuration calls are rejected from then on. On rejection
    /// (incomplete configuration, e.g. no addresses) the stack stays
    /// configurable and no data-plane call will be accepted.
    pub fn finalize(&mut self) -> Result<()> {
        self.ensure_configuring()?;
        let status = self.engine.finalize();
        if status.is_rejected() {
            debug!(%status, "engine rejected configuration");
            return Err(StackError::EngineRejected {
                op: "finalize",
                status,
            });
        }
        self.phase = Phase::Finalized;
        debug!(transport = ?self.cfg.transport, "stack finalized");
        Ok(())
    }

    // --- data plane --------------------------------------------------------

    pub fn connect_v4(
        &mut self,
        handle: SocketHandle,
        addr: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Result<()> {
        self.ensure_finalized()?;
        self.registry.get(handle)?;
        check(
            "connect_v4",
            self.engine.connect_v4(handle, addr, src_port, dst_port),
        )
    }

    pub fn connect_v6(
        &mut self,
        handle: SocketHandle,
        addr: Ipv6Addr,
        src_port: u16,
        dst_port: u16,
    ) -> Result<()> {
        self.ensure_finalized()?;
        self.registry.get(handle)?;
        check(
            "connect_v6",
            self.engine.connect_v6(handle, addr, src_port, dst_port),
        )
    }

    /// Copy-variant send: `bytes` stays with the caller, who may reuse it as
    /// soon as this returns.
    pub fn send_copy(
        &mut self,
        handle: SocketHandle,
        bytes: &[u8],
        endpoint: Endpoint,
    ) -> Result<()> {
        let block = TxBlock::copied(bytes);
        self.queue_send(handle, block, endpoint)
    }

    /// Zero-copy send: the block owns `data`, and `release` is guaranteed to
    /// fire exactly once — when the engine is done with the bytes, when the
    /// send is rejected, or when the stack is dropped with the block still
    /// queued.
    pub fn send_loaned(
        &mut self,
        handle: SocketHandle,
        data: Vec<u8>,
        release: ReleaseHook,
        endpoint: Endpoint,
    ) -> Result<()> {
        let block = TxBlock::loaned(data, release);
        self.queue_send(handle, block, endpoint)
    }

    fn queue_send(
        &mut self,
        handle: SocketHandle,
        block: TxBlock,
        endpoint: Endpoint,
    ) -> Result<()> {
        self.ensure_finalized()?;
        let desc = self.registry.get_mut(handle)?;
        if desc.kind() == SocketKind::Udp && !endpoint.has_addr() {
            return Err(StackError::EndpointRequired);
        }
        if !desc.enqueue(block, endpoint) {
            // The rejected block was consumed and dropped; its hook has fired.
            debug!(handle, "outbound queue full, send rejected");
            return Err(StackError::TxQueueFull { handle });
        }
        Ok(())
    }

    /// Allocator-driven receive with the default system allocator.
    ///
    /// `Ok(None)` means nothing was available; `Ok(Some(bytes))` means one
    /// block was delivered and is now host-owned. A delivered empty block is
    /// a valid, distinct outcome.
    pub fn receive(&mut self, handle: SocketHandle) -> Result<Option<Vec<u8>>> {
        self.receive_with(handle, &mut SystemAlloc)
    }

    /// Allocator-driven receive. The engine calls `alloc` exactly once, with
    /// the exact block size, only when it has data to deliver.
    pub fn receive_with(
        &mut self,
        handle: SocketHandle,
        alloc: &mut dyn BlockAlloc,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_finalized()?;
        self.registry.get(handle)?;
        let engine = &mut self.engine;
        receive_through(alloc, |slot, probe| engine.receive(handle, slot, probe))
    }

    // --- driving -----------------------------------------------------------

    /// Flush queued sends across the boundary, then advance engine state
    /// once. Non-blocking.
    pub fn poll(&mut self) -> Result<()> {
        self.ensure_finalized()?;
        flush_pending(&mut self.registry, &mut self.engine);
        check("poll", self.engine.poll())
    }

    /// Block until `handle` reaches a state change or `timeout` elapses. The
    /// socket's queued sends are flushed first so the engine has work to
    /// make progress on.
    pub fn spin(&mut self, handle: SocketHandle, timeout: Duration) -> Result<()> {
        self.ensure_finalized()?;
        let desc = self.registry.get_mut(handle)?;
        flush_descriptor(desc, &mut self.engine);
        check("spin", self.engine.spin(handle, as_millis(timeout)))
    }

    /// [`spin`](Stack::spin) over every socket.
    pub fn spin_all(&mut self, timeout: Duration) -> Result<()> {
        self.ensure_finalized()?;
        flush_pending(&mut self.registry, &mut self.engine);
        check("spin_all", self.engine.spin_all(as_millis(timeout)))
    }

    /// Yield until the engine's next scheduled deadline or external I/O
    /// readiness, bounded by `deadline_ms`. The alternative to busy-polling.
    pub fn phy_wait(&mut self, deadline_ms: Millis) -> Result<()> {
        self.ensure_finalized()?;
        self.engine.phy_wait(deadline_ms);
        Ok(())
    }

    // --- virtual point-to-point transport ----------------------------------

    /// Inject a raw frame into the virtual device from outside. The engine
    /// copies the frame before returning.
    pub fn virtual_tun_send(&mut self, frame: &[u8]) -> Result<()> {
        self.ensure_finalized()?;
        check("virtual_tun_send", self.engine.virtual_tun_send(frame))
    }

    /// Wait for a frame to leave the virtual device and deliver it through
    /// the allocator protocol.
    pub fn virtual_tun_receive_wait(
        &mut self,
        alloc: &mut dyn BlockAlloc,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_finalized()?;
        let engine = &mut self.engine;
        receive_through(alloc, |slot, probe| {
            engine.virtual_tun_receive_wait(slot, probe)
        })
    }

    /// Non-blocking variant of
    /// [`virtual_tun_receive_wait`](Stack::virtual_tun_receive_wait).
    pub fn virtual_tun_receive_instantly(
        &mut self,
        alloc: &mut dyn BlockAlloc,
    ) -> Result<Option<Vec<u8>>> {
        self.ensure_finalized()?;
        let engine = &mut self.engine;
        receive_through(alloc, |slot, probe| {
            engine.virtual_tun_receive_instantly(slot, probe)
        })
    }

    // --- internals ---------------------------------------------------------

    fn ensure_configuring(&self) -> Result<()> {
        match self.phase {
            Phase::Configuring => Ok(()),
            Phase::Finalized => Err(StackError::AlreadyFinalized),
        }
    }

    fn ensure_finalized(&self) -> Result<()> {
        match self.phase {
            Phase::Finalized => Ok(()),
            Phase::Configuring => Err(StackError::NotFinalized),
        }
    }
}

fn as_millis(timeout: Duration) -> Millis {
    timeout.as_millis().min(Millis::MAX as u128) as Millis
}

fn check(op: &'static str, status: Status) -> Result<()> {
    if status.is_rejected() {
        debug!(op, %status, "engine rejected call");
        return Err(StackError::EngineRejected { op, status });
    }
    Ok(())
}

/// Move every queued block across the boundary. A rejected block was consumed
/// by the engine anyway (its hook fires on the engine's rejection path); the
/// handoff is fire-and-forget, not a delivery guarantee.
fn flush_pending(registry: &mut HandleRegistry, engine: &mut Box<dyn PacketEngine>) {
    for desc in registry.descriptors_mut() {
        flush_descriptor(desc, engine);
    }
}

fn flush_descriptor(desc: &mut SocketDescriptor, engine: &mut Box<dyn PacketEngine>) {
    while let Some(pending) = desc.pop_pending() {
        let handle = desc.handle();
        let len = pending.block.len();
        let status = engine.send(handle, pending.block, pending.endpoint);
        if status.is_rejected() {
            debug!(handle, len, %status, "engine rejected queued send");
        } else {
            trace!(handle, len, "queued send crossed the boundary");
        }
    }
}

/// Run one allocator-driven receive call, tracking allocator failure
/// out-of-band so it surfaces as `AllocationFailed` rather than being folded
/// into the engine's status byte.
fn receive_through(
    alloc: &mut dyn BlockAlloc,
    call: impl FnOnce(&mut RxSlot, &mut dyn BlockAlloc) -> Status,
) -> Result<Option<Vec<u8>>> {
    let mut slot = RxSlot::empty();
    let mut failed_len: Option<usize> = None;
    let mut probe = |len: usize| match alloc.alloc(len) {
        Ok(buf) => Ok(buf),
        Err(err) => {
            failed_len = Some(err.len);
            Err(err)
        }
    };
    let status = call(&mut slot, &mut probe);
    if let Some(len) = failed_len {
        return Err(StackError::AllocationFailed { len });
    }
    if status.is_rejected() {
        return Ok(None);
    }
    debug_assert!(slot.is_filled(), "engine reported delivery with empty slot");
    Ok(Some(slot.take().unwrap_or_default()))
}
