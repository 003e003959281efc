//! Buffer-ownership types for the two directions of the boundary.
//!
//! Every byte block crossing the boundary has exactly one owner at any time:
//!
//! - Host → engine: the host builds a [`TxBlock`] and moves it across the
//!   boundary. The engine decides when the bytes are no longer needed; the
//!   attached [`ReleaseHook`] fires exactly once when the block is dropped,
//!   whether the send was accepted or rejected.
//! - Engine → host: the engine asks the host for storage through a
//!   [`BlockAlloc`], fills it, and places it in the caller's [`RxSlot`]. On a
//!   success status the host owns the filled buffer.

use thiserror::Error;

/// The host-side allocator could not provide a block of the requested size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("allocation of {len} bytes failed")]
pub struct AllocError {
    pub len: usize,
}

/// Host-side storage provider for engine → host transfers.
///
/// The engine invokes the allocator zero or one time per receive call, with
/// the exact size of the pending block. Implementations must be reentrant-safe
/// and carry no per-call state.
pub trait BlockAlloc {
    fn alloc(&mut self, len: usize) -> Result<Vec<u8>, AllocError>;
}

impl<F> BlockAlloc for F
where
    F: FnMut(usize) -> Result<Vec<u8>, AllocError>,
{
    fn alloc(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        self(len)
    }
}

/// Allocates zero-initialized storage from the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAlloc;

impl BlockAlloc for SystemAlloc {
    fn alloc(&mut self, len: usize) -> Result<Vec<u8>, AllocError> {
        Ok(vec![0; len])
    }
}

/// One-shot release capability attached to a loaned byte block.
///
/// The closure captures whatever owner state needs to be notified when the
/// consumer is done with the bytes. Firing the hook a second time is a
/// programming error and panics; an unfired hook fires when dropped, so the
/// single-invocation contract holds on every path.
pub struct ReleaseHook {
    hook: Option<Box<dyn FnOnce() + Send>>,
    fired: bool,
}

impl ReleaseHook {
    pub fn new(hook: impl FnOnce() + Send + 'static) -> Self {
        Self {
            hook: Some(Box::new(hook)),
            fired: false,
        }
    }

    /// A hook that notifies nobody, for blocks whose storage needs no
    /// owner-side cleanup.
    pub fn noop() -> Self {
        Self {
            hook: None,
            fired: false,
        }
    }

    /// Fire the hook. Panics if it has already fired.
    pub fn fire(&mut self) {
        assert!(!self.fired, "release hook fired more than once");
        self.fired = true;
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

impl Drop for ReleaseHook {
    fn drop(&mut self) {
        if !self.fired {
            self.fire();
        }
    }
}

impl core::fmt::Debug for ReleaseHook {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReleaseHook")
            .field("fired", &self.fired)
            .finish()
    }
}

/// An owned byte block travelling host → engine.
///
/// The send cursor tracks how much of the block the engine has already
/// consumed, so a partially transmitted block can resume where it stopped.
#[derive(Debug)]
pub struct TxBlock {
    data: Vec<u8>,
    cursor: usize,
    release: ReleaseHook,
}

impl TxBlock {
    /// Copy-variant send: the caller keeps its own buffer and the engine gets
    /// an independent copy with no release obligation beyond the drop itself.
    pub fn copied(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            cursor: 0,
            release: ReleaseHook::noop(),
        }
    }

    /// Zero-copy-variant send: the block takes ownership of `data` and
    /// guarantees `release` fires exactly once when the consumer is done,
    /// accepted or not.
    pub fn loaned(data: Vec<u8>, release: ReleaseHook) -> Self {
        Self {
            data,
            cursor: 0,
            release,
        }
    }

    /// Total length of the block, independent of the cursor.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The bytes not yet consumed.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.cursor..]
    }

    /// Record that the engine consumed `n` more bytes.
    pub fn advance(&mut self, n: usize) {
        let cursor = self.cursor + n;
        assert!(cursor <= self.data.len(), "advanced past end of block");
        self.cursor = cursor;
    }

    pub fn is_fully_sent(&self) -> bool {
        self.cursor == self.data.len()
    }
}

/// Out-descriptor for engine → host transfers.
///
/// The caller passes an empty slot; the engine fills it only when it reports
/// a success status. A filled zero-length block is a valid delivery, distinct
/// from "nothing available" (an unfilled slot plus a nonzero status).
#[derive(Debug, Default)]
pub struct RxSlot {
    data: Option<Vec<u8>>,
}

impl RxSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Engine side: hand the filled buffer to the host.
    pub fn fill(&mut self, bytes: Vec<u8>) {
        debug_assert!(self.data.is_none(), "receive slot filled twice");
        self.data = Some(bytes);
    }

    pub fn is_filled(&self) -> bool {
        self.data.is_some()
    }

    /// Host side: take ownership of the delivered bytes.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        self.data.take()
    }
}
