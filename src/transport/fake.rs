//! An in-memory transport which can be used for mocking a target in tests
//! or for dry runs.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::transport::{wire, DebugTransport, TransportError};

/// One recorded interaction with the fake link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// The link was opened.
    Open,
    /// The link was closed.
    Close,
    /// The reset line was driven.
    ResetLine(bool),
    /// A request frame was sent.
    Request(Vec<u8>),
}

#[derive(Debug)]
struct FakeTargetState {
    open: bool,
    memory: HashMap<u64, u8>,
    registers: HashMap<(u8, u16), u64>,
    running: BTreeSet<u8>,
    reply_queue: VecDeque<u8>,
    operations: Vec<Operation>,
    handshake_reply: Vec<u8>,
    timeout_next_receive: bool,
    sends_before_failure: Option<usize>,
}

impl FakeTargetState {
    fn new() -> Self {
        Self {
            open: false,
            memory: HashMap::new(),
            registers: HashMap::new(),
            running: BTreeSet::new(),
            reply_queue: VecDeque::new(),
            operations: Vec::new(),
            handshake_reply: wire::HANDSHAKE_MAGIC.to_vec(),
            timeout_next_receive: false,
            sends_before_failure: None,
        }
    }

    fn execute(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let malformed = || TransportError::Io("malformed request frame".to_string());

        match *frame.first().ok_or_else(malformed)? {
            wire::OP_HANDSHAKE => {
                // Handshake implies the chip reset sequence ran; all cores
                // come up halted and stale replies are flushed.
                self.running.clear();
                self.reply_queue.clear();
                let reply = self.handshake_reply.clone();
                self.reply_queue.extend(reply);
            }
            wire::OP_HALT => {
                let core = *frame.get(1).ok_or_else(malformed)?;
                self.running.remove(&core);
                self.reply_queue.push_back(wire::ACK);
            }
            wire::OP_RESUME => {
                let core = *frame.get(1).ok_or_else(malformed)?;
                self.running.insert(core);
                self.reply_queue.push_back(wire::ACK);
            }
            wire::OP_STEP => {
                let _core = *frame.get(1).ok_or_else(malformed)?;
                self.reply_queue.push_back(wire::ACK);
            }
            wire::OP_READ_MEM => {
                let (address, len) = parse_memory_header(frame).ok_or_else(malformed)?;
                for offset in 0..u64::from(len) {
                    let byte = self.memory.get(&(address + offset)).copied().unwrap_or(0);
                    self.reply_queue.push_back(byte);
                }
            }
            wire::OP_WRITE_MEM => {
                let (address, len) = parse_memory_header(frame).ok_or_else(malformed)?;
                let payload = frame.get(13..).ok_or_else(malformed)?;
                if payload.len() != len as usize {
                    return Err(malformed());
                }
                for (offset, byte) in payload.iter().enumerate() {
                    self.memory.insert(address + offset as u64, *byte);
                }
                self.reply_queue.push_back(wire::ACK);
            }
            wire::OP_READ_REG => {
                let (core, id) = parse_register_header(frame).ok_or_else(malformed)?;
                let value = self.registers.get(&(core, id)).copied().unwrap_or(0);
                self.reply_queue.extend(value.to_le_bytes());
            }
            wire::OP_WRITE_REG => {
                let (core, id) = parse_register_header(frame).ok_or_else(malformed)?;
                let value = frame.get(4..12).ok_or_else(malformed)?;
                let value = u64::from_le_bytes(value.try_into().expect("slice of length 8"));
                self.registers.insert((core, id), value);
                self.reply_queue.push_back(wire::ACK);
            }
            _ => return Err(malformed()),
        }

        Ok(())
    }
}

fn parse_memory_header(frame: &[u8]) -> Option<(u64, u32)> {
    let address = u64::from_le_bytes(frame.get(1..9)?.try_into().ok()?);
    let len = u32::from_le_bytes(frame.get(9..13)?.try_into().ok()?);
    Some((address, len))
}

fn parse_register_header(frame: &[u8]) -> Option<(u8, u16)> {
    let core = *frame.get(1)?;
    let id = u16::from_le_bytes(frame.get(2..4)?.try_into().ok()?);
    Some((core, id))
}

/// A mock debug link backed by an in-memory target model.
///
/// Cloning yields another handle onto the same target model, so a test can
/// keep one clone for inspection while the bridge owns the other.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeTargetState>>,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTransport {
    /// Creates a fake link to a powered, reachable target.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeTargetState::new())),
        }
    }

    /// Replaces the reply the target sends to the attach handshake.
    pub fn with_handshake_reply(self, reply: impl Into<Vec<u8>>) -> Self {
        self.state.lock().unwrap().handshake_reply = reply.into();
        self
    }

    /// Makes the next `receive` call fail with a timeout.
    pub fn timeout_next_receive(&self) {
        self.state.lock().unwrap().timeout_next_receive = true;
    }

    /// Makes every send after the next `n` fail with an I/O error.
    pub fn fail_sends_after(&self, n: usize) {
        self.state.lock().unwrap().sends_before_failure = Some(n);
    }

    /// Reads back `len` bytes of the modelled target memory.
    pub fn memory(&self, address: u64, len: usize) -> Vec<u8> {
        let state = self.state.lock().unwrap();
        (0..len as u64)
            .map(|offset| state.memory.get(&(address + offset)).copied().unwrap_or(0))
            .collect()
    }

    /// Pre-loads the modelled target memory.
    pub fn preload_memory(&self, address: u64, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        for (offset, byte) in bytes.iter().enumerate() {
            state.memory.insert(address + offset as u64, *byte);
        }
    }

    /// The modelled value of a debug unit register, if it was ever written.
    pub fn register(&self, core: u8, id: u16) -> Option<u64> {
        self.state.lock().unwrap().registers.get(&(core, id)).copied()
    }

    /// Sets the modelled value of a debug unit register.
    pub fn set_register(&self, core: u8, id: u16, value: u64) {
        self.state.lock().unwrap().registers.insert((core, id), value);
    }

    /// Whether the modelled core `core` is currently running.
    pub fn is_running(&self, core: u8) -> bool {
        self.state.lock().unwrap().running.contains(&core)
    }

    /// Whether the link is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    /// All recorded link interactions, oldest first.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Number of memory write request frames seen so far.
    pub fn memory_write_requests(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| matches!(op, Operation::Request(frame) if frame.first() == Some(&wire::OP_WRITE_MEM)))
            .count()
    }
}

impl DebugTransport for FakeTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.open = true;
        state.operations.push(Operation::Open);
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.open {
            state.open = false;
            state.operations.push(Operation::Close);
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if let Some(remaining) = state.sends_before_failure.as_mut() {
            if *remaining == 0 {
                return Err(TransportError::Io("link dropped by test harness".to_string()));
            }
            *remaining -= 1;
        }
        state.operations.push(Operation::Request(bytes.to_vec()));
        state.execute(bytes)
    }

    fn receive(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::Closed);
        }
        if state.timeout_next_receive {
            state.timeout_next_receive = false;
            return Err(TransportError::Timeout(timeout));
        }
        if state.reply_queue.len() < len {
            return Err(TransportError::ShortResponse {
                expected: len,
                available: state.reply_queue.len(),
            });
        }
        Ok(state.reply_queue.drain(..len).collect())
    }

    fn reset_line(&mut self, assert: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::Closed);
        }
        state.operations.push(Operation::ResetLine(assert));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_memory_round_trip() {
        let mut link = FakeTransport::new();
        link.open().unwrap();

        link.send(&wire::memory_request(wire::OP_WRITE_MEM, 0x1C00_0000, 4))
            .unwrap_err();

        let mut frame = wire::memory_request(wire::OP_WRITE_MEM, 0x1C00_0000, 4);
        frame.extend_from_slice(&[1, 2, 3, 4]);
        link.send(&frame).unwrap();
        assert_eq!(
            link.receive(1, Duration::from_millis(10)).unwrap(),
            vec![wire::ACK]
        );

        link.send(&wire::memory_request(wire::OP_READ_MEM, 0x1C00_0000, 4))
            .unwrap();
        assert_eq!(
            link.receive(4, Duration::from_millis(10)).unwrap(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn closed_link_rejects_traffic() {
        let mut link = FakeTransport::new();
        assert!(matches!(
            link.send(&[wire::OP_HANDSHAKE]),
            Err(TransportError::Closed)
        ));
    }
}
