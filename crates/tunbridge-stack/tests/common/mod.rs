//! Scripted engine double shared by the integration tests.
//!
//! The double records every boundary call and lets tests script rejection
//! statuses, connection-establishment delay and received data. It implements
//! the allocator protocol faithfully: the allocator runs exactly once per
//! delivered block, with the exact block size, and never runs otherwise.
#![allow(dead_code)]

use core::net::{Ipv4Addr, Ipv6Addr};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use tunbridge_engine::{
    BlockAlloc, Endpoint, Ipv4Cidr, Ipv6Cidr, Millis, PacketEngine, RxSlot, SocketHandle,
    SocketKind, Status, TxBlock,
};

pub const STATUS_NO_DATA: Status = Status(1);
pub const STATUS_NOT_CONNECTED: Status = Status(2);
pub const STATUS_NO_CONFIG: Status = Status(3);
pub const STATUS_ALLOC_FAILED: Status = Status(4);
pub const STATUS_UNKNOWN_SOCKET: Status = Status(5);

#[derive(Default)]
struct State {
    sockets: HashMap<SocketHandle, SocketKind>,
    addresses: usize,
    v4_gateway: Option<Ipv4Addr>,
    v6_gateway: Option<Ipv6Addr>,
    finalized: bool,

    polls: u64,
    spins: u64,
    phy_waits: u64,

    /// Polls that must elapse after `connect_*` before the socket counts as
    /// established.
    polls_to_establish: u64,
    connecting: HashMap<SocketHandle, u64>,

    /// Established sockets echo accepted payloads into their receive queue.
    echo: bool,
    /// Retain accepted blocks instead of dropping them, simulating an engine
    /// that still owns loaned buffers at teardown.
    hold_sent_blocks: bool,
    held: Vec<TxBlock>,

    reject_add_socket: Option<Status>,
    reject_sends: Option<Status>,

    sent: Vec<(SocketHandle, Vec<u8>)>,
    rx: HashMap<SocketHandle, VecDeque<Vec<u8>>>,

    tun_injected: Vec<Vec<u8>>,
    tun_outbound: VecDeque<Vec<u8>>,
    tun_wait_calls: u64,
}

impl State {
    fn established(&self, handle: SocketHandle) -> bool {
        match self.connecting.get(&handle) {
            Some(at) => self.polls - at >= self.polls_to_establish,
            None => false,
        }
    }

    fn accept_payload(&mut self, handle: SocketHandle, payload: Vec<u8>) {
        if self.echo {
            self.rx.entry(handle).or_default().push_back(payload.clone());
        }
        self.sent.push((handle, payload));
    }
}

/// Deliver one queued block through the allocator protocol.
fn deliver(bytes: Option<Vec<u8>>, slot: &mut RxSlot, alloc: &mut dyn BlockAlloc) -> Status {
    match bytes {
        Some(bytes) => match alloc.alloc(bytes.len()) {
            Ok(mut buf) => {
                buf.copy_from_slice(&bytes);
                slot.fill(buf);
                Status::OK
            }
            Err(_) => STATUS_ALLOC_FAILED,
        },
        None => STATUS_NO_DATA,
    }
}

/// The engine half: owned by the stack under test. Dropping it releases every
/// block the engine still holds, as a real engine's teardown must.
pub struct ScriptedEngine {
    state: Rc<RefCell<State>>,
}

/// The test half: shared view used to script behavior and observe calls.
#[derive(Clone)]
pub struct EngineProbe {
    state: Rc<RefCell<State>>,
}

pub fn scripted_engine() -> (ScriptedEngine, EngineProbe) {
    let state = Rc::new(RefCell::new(State::default()));
    (
        ScriptedEngine {
            state: state.clone(),
        },
        EngineProbe { state },
    )
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.state.borrow_mut().held.clear();
    }
}

impl EngineProbe {
    pub fn set_echo(&self, on: bool) {
        self.state.borrow_mut().echo = on;
    }

    pub fn set_polls_to_establish(&self, polls: u64) {
        self.state.borrow_mut().polls_to_establish = polls;
    }

    pub fn set_hold_sent_blocks(&self, on: bool) {
        self.state.borrow_mut().hold_sent_blocks = on;
    }

    pub fn set_reject_add_socket(&self, status: Option<Status>) {
        self.state.borrow_mut().reject_add_socket = status;
    }

    pub fn set_reject_sends(&self, status: Option<Status>) {
        self.state.borrow_mut().reject_sends = status;
    }

    pub fn push_rx(&self, handle: SocketHandle, bytes: Vec<u8>) {
        self.state
            .borrow_mut()
            .rx
            .entry(handle)
            .or_default()
            .push_back(bytes);
    }

    pub fn push_tun_frame(&self, frame: Vec<u8>) {
        self.state.borrow_mut().tun_outbound.push_back(frame);
    }

    pub fn established(&self, handle: SocketHandle) -> bool {
        self.state.borrow().established(handle)
    }

    pub fn polls(&self) -> u64 {
        self.state.borrow().polls
    }

    pub fn spins(&self) -> u64 {
        self.state.borrow().spins
    }

    pub fn phy_waits(&self) -> u64 {
        self.state.borrow().phy_waits
    }

    pub fn tun_wait_calls(&self) -> u64 {
        self.state.borrow().tun_wait_calls
    }

    pub fn sent(&self) -> Vec<(SocketHandle, Vec<u8>)> {
        self.state.borrow().sent.clone()
    }

    pub fn injected_frames(&self) -> Vec<Vec<u8>> {
        self.state.borrow().tun_injected.clone()
    }

    pub fn held_blocks(&self) -> usize {
        self.state.borrow().held.len()
    }

    pub fn socket_kinds(&self) -> HashMap<SocketHandle, SocketKind> {
        self.state.borrow().sockets.clone()
    }

    pub fn v4_gateway(&self) -> Option<Ipv4Addr> {
        self.state.borrow().v4_gateway
    }
}

impl PacketEngine for ScriptedEngine {
    fn add_socket(&mut self, kind: SocketKind, handle: SocketHandle) -> Status {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.reject_add_socket {
            return status;
        }
        state.sockets.insert(handle, kind);
        Status::OK
    }

    fn add_ipv4_address(&mut self, _cidr: Ipv4Cidr) -> Status {
        self.state.borrow_mut().addresses += 1;
        Status::OK
    }

    fn add_ipv6_address(&mut self, _cidr: Ipv6Cidr) -> Status {
        self.state.borrow_mut().addresses += 1;
        Status::OK
    }

    fn add_default_v4_gateway(&mut self, gateway: Ipv4Addr) -> Status {
        self.state.borrow_mut().v4_gateway = Some(gateway);
        Status::OK
    }

    fn add_default_v6_gateway(&mut self, gateway: Ipv6Addr) -> Status {
        self.state.borrow_mut().v6_gateway = Some(gateway);
        Status::OK
    }

    fn finalize(&mut self) -> Status {
        let mut state = self.state.borrow_mut();
        if state.addresses == 0 {
            return STATUS_NO_CONFIG;
        }
        state.finalized = true;
        Status::OK
    }

    fn connect_v4(
        &mut self,
        handle: SocketHandle,
        _addr: Ipv4Addr,
        _src_port: u16,
        _dst_port: u16,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.sockets.contains_key(&handle) {
            return STATUS_UNKNOWN_SOCKET;
        }
        let now = state.polls;
        state.connecting.insert(handle, now);
        Status::OK
    }

    fn connect_v6(
        &mut self,
        handle: SocketHandle,
        _addr: Ipv6Addr,
        _src_port: u16,
        _dst_port: u16,
    ) -> Status {
        let mut state = self.state.borrow_mut();
        if !state.sockets.contains_key(&handle) {
            return STATUS_UNKNOWN_SOCKET;
        }
        let now = state.polls;
        state.connecting.insert(handle, now);
        Status::OK
    }

    fn send(&mut self, handle: SocketHandle, block: TxBlock, _endpoint: Endpoint) -> Status {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.reject_sends {
            return status;
        }
        match state.sockets.get(&handle).copied() {
            Some(SocketKind::Tcp) if !state.established(handle) => STATUS_NOT_CONNECTED,
            Some(_) => {
                state.accept_payload(handle, block.remaining().to_vec());
                if state.hold_sent_blocks {
                    state.held.push(block);
                }
                Status::OK
            }
            None => STATUS_UNKNOWN_SOCKET,
        }
    }

    fn send_copy(&mut self, handle: SocketHandle, bytes: &[u8], _endpoint: Endpoint) -> Status {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.reject_sends {
            return status;
        }
        match state.sockets.get(&handle).copied() {
            Some(SocketKind::Tcp) if !state.established(handle) => STATUS_NOT_CONNECTED,
            Some(_) => {
                state.accept_payload(handle, bytes.to_vec());
                Status::OK
            }
            None => STATUS_UNKNOWN_SOCKET,
        }
    }

    fn receive(
        &mut self,
        handle: SocketHandle,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status {
        let bytes = {
            let mut state = self.state.borrow_mut();
            state.rx.get_mut(&handle).and_then(VecDeque::pop_front)
        };
        deliver(bytes, slot, alloc)
    }

    fn poll(&mut self) -> Status {
        self.state.borrow_mut().polls += 1;
        Status::OK
    }

    fn spin(&mut self, _handle: SocketHandle, _timeout_ms: Millis) -> Status {
        let mut state = self.state.borrow_mut();
        state.spins += 1;
        state.polls += 1;
        Status::OK
    }

    fn spin_all(&mut self, _timeout_ms: Millis) -> Status {
        let mut state = self.state.borrow_mut();
        state.spins += 1;
        state.polls += 1;
        Status::OK
    }

    fn phy_wait(&mut self, _deadline_ms: Millis) {
        self.state.borrow_mut().phy_waits += 1;
    }

    fn virtual_tun_send(&mut self, frame: &[u8]) -> Status {
        self.state.borrow_mut().tun_injected.push(frame.to_vec());
        Status::OK
    }

    fn virtual_tun_receive_wait(
        &mut self,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status {
        let bytes = {
            let mut state = self.state.borrow_mut();
            state.tun_wait_calls += 1;
            state.tun_outbound.pop_front()
        };
        deliver(bytes, slot, alloc)
    }

    fn virtual_tun_receive_instantly(
        &mut self,
        slot: &mut RxSlot,
        alloc: &mut dyn BlockAlloc,
    ) -> Status {
        let bytes = self.state.borrow_mut().tun_outbound.pop_front();
        deliver(bytes, slot, alloc)
    }
}

/// Allocator that counts its invocations and the sizes requested.
#[derive(Default)]
pub struct CountingAlloc {
    pub sizes: Vec<usize>,
}

impl BlockAlloc for CountingAlloc {
    fn alloc(&mut self, len: usize) -> Result<Vec<u8>, tunbridge_engine::AllocError> {
        self.sizes.push(len);
        Ok(vec![0; len])
    }
}

/// Allocator that always fails.
#[derive(Default)]
pub struct FailingAlloc;

impl BlockAlloc for FailingAlloc {
    fn alloc(&mut self, len: usize) -> Result<Vec<u8>, tunbridge_engine::AllocError> {
        Err(tunbridge_engine::AllocError { len })
    }
}
