//! Glue logic for driving a stack from a host event loop.
//!
//! Hosts that embed the stack need the same deterministic "per tick" shape:
//! 1. Flush queued sends and advance engine state (`poll`).
//! 2. Drain delivered blocks from each watched socket to a host sink, with a
//!    bounded budget.
//! 3. Yield until the engine's next deadline (`phy_wait`) instead of
//!    busy-polling.
//!
//! The pump owns neither the stack nor the sink; it stores budgets and the
//! watch list, matching the borrow-everything tick style of emulator main
//! loops. Like the stack itself it must be driven from a single thread.
#![forbid(unsafe_code)]

use tunbridge_engine::{Millis, SocketHandle};
use tunbridge_stack::{Result, Stack};

/// Default per-socket block budget for each [`TickPump::tick`] call.
pub const DEFAULT_MAX_RX_PER_TICK: usize = 256;

/// Number of blocks delivered during a tick.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickCounts {
    /// Blocks handed to the sink across all watched sockets.
    pub rx_blocks: usize,
    /// Sockets whose budget was exhausted while data kept coming.
    pub saturated_sockets: usize,
}

/// Consumer of delivered blocks.
pub trait RxSink {
    fn deliver(&mut self, handle: SocketHandle, bytes: Vec<u8>);
}

impl<F: FnMut(SocketHandle, Vec<u8>)> RxSink for F {
    fn deliver(&mut self, handle: SocketHandle, bytes: Vec<u8>) {
        self(handle, bytes)
    }
}

/// Drives one stack on a host-controlled cadence.
#[derive(Debug, Clone)]
pub struct TickPump {
    watched: Vec<SocketHandle>,
    max_rx_per_tick: usize,
}

impl Default for TickPump {
    fn default() -> Self {
        Self::new()
    }
}

impl TickPump {
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_MAX_RX_PER_TICK)
    }

    /// `max_rx_per_tick` bounds the blocks drained per socket per tick so a
    /// chatty peer cannot starve the rest of the loop.
    pub fn with_budget(max_rx_per_tick: usize) -> Self {
        Self {
            watched: Vec::new(),
            max_rx_per_tick,
        }
    }

    /// Add a socket to the drain list. Watching the same handle twice is a
    /// no-op.
    pub fn watch(&mut self, handle: SocketHandle) {
        if !self.watched.contains(&handle) {
            self.watched.push(handle);
        }
    }

    pub fn unwatch(&mut self, handle: SocketHandle) {
        self.watched.retain(|&h| h != handle);
    }

    pub fn watched(&self) -> &[SocketHandle] {
        &self.watched
    }

    pub fn max_rx_per_tick(&self) -> usize {
        self.max_rx_per_tick
    }

    /// Run one pump iteration: flush + poll, then drain watched sockets into
    /// `sink` up to the budget.
    pub fn tick(&mut self, stack: &mut Stack, sink: &mut dyn RxSink) -> Result<TickCounts> {
        let mut counts = TickCounts::default();

        stack.poll()?;

        for &handle in &self.watched {
            let mut drained = 0;
            loop {
                if drained == self.max_rx_per_tick {
                    counts.saturated_sockets += 1;
                    break;
                }
                match stack.receive(handle)? {
                    Some(bytes) => {
                        sink.deliver(handle, bytes);
                        drained += 1;
                    }
                    None => break,
                }
            }
            counts.rx_blocks += drained;
        }

        Ok(counts)
    }

    /// Like [`tick`](TickPump::tick), then yield until the engine's next
    /// deadline, bounded by `deadline_ms`.
    pub fn tick_and_wait(
        &mut self,
        stack: &mut Stack,
        sink: &mut dyn RxSink,
        deadline_ms: Millis,
    ) -> Result<TickCounts> {
        let counts = self.tick(stack, sink)?;
        stack.phy_wait(deadline_ms)?;
        Ok(counts)
    }
}
