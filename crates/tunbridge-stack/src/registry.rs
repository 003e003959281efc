//! Handle-indexed socket registry.

use std::collections::HashMap;

use tunbridge_engine::{SocketHandle, SocketKind};

use crate::error::{Result, StackError};
use crate::socket::SocketDescriptor;

/// The single source of truth for which sockets exist from the host's
/// perspective.
///
/// Handles are strictly increasing and never reused, even after the engine
/// stops caring about them — recycling a handle would let a stale reference
/// silently address a new socket. Counter saturation is a fatal condition,
/// not a wraparound.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    last: SocketHandle,
    slots: HashMap<SocketHandle, SocketDescriptor>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next handle and create its descriptor. The only operation
    /// that mutates registry state.
    pub fn allocate(&mut self, kind: SocketKind, max_pending: usize) -> Result<SocketHandle> {
        let handle = self
            .last
            .checked_add(1)
            .ok_or(StackError::HandleExhausted)?;
        self.last = handle;
        self.slots
            .insert(handle, SocketDescriptor::new(handle, kind, max_pending));
        Ok(handle)
    }

    pub fn get(&self, handle: SocketHandle) -> Result<&SocketDescriptor> {
        self.slots
            .get(&handle)
            .ok_or(StackError::InvalidHandle { handle })
    }

    pub fn get_mut(&mut self, handle: SocketHandle) -> Result<&mut SocketDescriptor> {
        self.slots
            .get_mut(&handle)
            .ok_or(StackError::InvalidHandle { handle })
    }

    /// Drop a descriptor whose engine-side registration failed. The handle
    /// number stays burned; this is not a reuse path.
    pub(crate) fn discard(&mut self, handle: SocketHandle) {
        self.slots.remove(&handle);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn descriptors_mut(&mut self) -> impl Iterator<Item = &mut SocketDescriptor> {
        self.slots.values_mut()
    }
}
