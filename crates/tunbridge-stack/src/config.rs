//! Stack configuration.

use std::ops::RangeInclusive;

use tunbridge_engine::TransportKind;

use crate::ports::EPHEMERAL_RANGE;

#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Name of the device the engine attaches to. Ignored by the virtual
    /// transport.
    pub interface_name: String,

    pub transport: TransportKind,

    /// Maximum number of outbound blocks queued per socket while they await
    /// transfer to the engine.
    ///
    /// When exceeded, the send is rejected with `TxQueueFull` and the
    /// rejected block's release hook fires immediately.
    pub max_pending_sends_per_socket: usize,

    /// Source-port range for [`crate::Stack::ephemeral_port`].
    pub ephemeral_ports: RangeInclusive<u16>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            interface_name: "tun0".to_string(),
            transport: TransportKind::VirtualTun,
            max_pending_sends_per_socket: 32,
            ephemeral_ports: EPHEMERAL_RANGE,
        }
    }
}
