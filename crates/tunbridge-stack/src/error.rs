use thiserror::Error;
use tunbridge_engine::{SocketHandle, Status};

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Debug, Error)]
pub enum StackError {
    /// Lookup against a handle this stack never allocated.
    #[error("unknown socket handle {handle}")]
    InvalidHandle { handle: SocketHandle },

    /// The handle counter would overflow. Unrecoverable; handles are never
    /// reused, so a saturated counter means the session is over.
    #[error("socket handle space exhausted")]
    HandleExhausted,

    /// A data-plane call arrived before `finalize` succeeded.
    #[error("stack is not finalized")]
    NotFinalized,

    /// A configuration call arrived after `finalize` succeeded.
    #[error("stack is already finalized; configuration is closed")]
    AlreadyFinalized,

    /// The engine returned a nonzero status. An expected runtime condition
    /// (queue full, not connected, incomplete configuration), not a
    /// programming error.
    #[error("{op} rejected by engine (status {status})")]
    EngineRejected { op: &'static str, status: Status },

    /// The socket's outbound queue is at capacity; the rejected block's
    /// release hook has already fired.
    #[error("outbound queue full for socket {handle}")]
    TxQueueFull { handle: SocketHandle },

    /// The host-side allocator callback could not satisfy the engine's
    /// request.
    #[error("host allocator could not provide {len} bytes")]
    AllocationFailed { len: usize },

    /// A datagram send was attempted without a destination endpoint.
    #[error("datagram send requires a destination endpoint")]
    EndpointRequired,
}
