//! Host-side socket descriptors.

use std::collections::VecDeque;

use tunbridge_engine::{Endpoint, SocketHandle, SocketKind, TxBlock};

/// An outbound block waiting to cross the boundary.
#[derive(Debug)]
pub(crate) struct PendingSend {
    pub block: TxBlock,
    pub endpoint: Endpoint,
}

/// Host-side state for one socket: its handle, its protocol, and the bounded
/// queue of blocks awaiting transfer to the engine.
///
/// Descriptors are created by [`crate::HandleRegistry::allocate`] and live
/// until the owning stack is dropped; there is no per-socket close.
#[derive(Debug)]
pub struct SocketDescriptor {
    handle: SocketHandle,
    kind: SocketKind,
    pending: VecDeque<PendingSend>,
    max_pending: usize,
}

impl SocketDescriptor {
    pub(crate) fn new(handle: SocketHandle, kind: SocketKind, max_pending: usize) -> Self {
        Self {
            handle,
            kind,
            pending: VecDeque::new(),
            max_pending,
        }
    }

    pub fn handle(&self) -> SocketHandle {
        self.handle
    }

    pub fn kind(&self) -> SocketKind {
        self.kind
    }

    /// Number of blocks still waiting to cross the boundary.
    pub fn pending_sends(&self) -> usize {
        self.pending.len()
    }

    /// Queue a block for the next flush. When the queue is at capacity the
    /// block is rejected — it is dropped here, which fires its release hook.
    pub(crate) fn enqueue(&mut self, block: TxBlock, endpoint: Endpoint) -> bool {
        if self.pending.len() >= self.max_pending {
            return false;
        }
        self.pending.push_back(PendingSend { block, endpoint });
        true
    }

    pub(crate) fn pop_pending(&mut self) -> Option<PendingSend> {
        self.pending.pop_front()
    }
}
