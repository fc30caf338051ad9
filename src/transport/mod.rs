//! The byte-level debug link to the physical target.
//!
//! The actual link (JTAG adapter, USB gateware, serial port) lives outside
//! this crate; the bridge only depends on the [`DebugTransport`] trait and
//! claims exactly one boxed transport for the lifetime of an attachment.
//! [`FakeTransport`] is an in-memory implementation used for tests and dry
//! runs.

pub mod fake;

pub use fake::FakeTransport;

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Errors on the physical debug link.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The link could not be established.
    #[error("The debug link could not be opened: {0}")]
    OpenFailed(String),
    /// The link is closed; the bridge is not attached or the adapter went away.
    #[error("The debug link is closed")]
    Closed,
    /// The target did not answer within the allotted time.
    #[error("The debug link timed out after {0:?}")]
    Timeout(Duration),
    /// The target answered with fewer bytes than the request requires.
    #[error("Short response on the debug link: expected {expected} bytes, got {available}")]
    ShortResponse {
        /// Bytes the running request needs.
        expected: usize,
        /// Bytes the target actually delivered.
        available: usize,
    },
    /// Any other I/O failure of the link.
    #[error("I/O error on the debug link: {0}")]
    Io(String),
}

/// An opened channel to the physical target.
///
/// All methods are synchronous and block for at most one link round trip.
/// Implementations do not retry; retry policy belongs to the caller of the
/// bridge.
pub trait DebugTransport: Send + fmt::Debug {
    /// Establishes the physical link.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Releases the physical link. Must be idempotent.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Sends one request frame to the target.
    fn send(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Receives exactly `len` reply bytes, waiting at most `timeout`.
    fn receive(&mut self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Drives the target's reset line.
    fn reset_line(&mut self, assert: bool) -> Result<(), TransportError>;
}

/// The host-side request framing spoken over the debug link.
///
/// One opcode byte followed by little-endian arguments; replies are either
/// a single [`wire::ACK`] byte or the requested payload.
pub(crate) mod wire {
    pub const OP_HANDSHAKE: u8 = 0x01;
    pub const OP_HALT: u8 = 0x02;
    pub const OP_RESUME: u8 = 0x03;
    pub const OP_STEP: u8 = 0x04;
    pub const OP_READ_MEM: u8 = 0x05;
    pub const OP_WRITE_MEM: u8 = 0x06;
    pub const OP_READ_REG: u8 = 0x07;
    pub const OP_WRITE_REG: u8 = 0x08;

    /// Positive acknowledge reply byte.
    pub const ACK: u8 = 0xA5;

    /// Reply to [`OP_HANDSHAKE`], sent by every PULP debug ROM.
    pub const HANDSHAKE_MAGIC: [u8; 4] = *b"PULP";

    /// Builds a memory access request header.
    pub fn memory_request(opcode: u8, address: u64, len: u32) -> Vec<u8> {
        let mut frame = Vec::with_capacity(13);
        frame.push(opcode);
        frame.extend_from_slice(&address.to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame
    }

    /// Builds a register access request header.
    pub fn register_request(opcode: u8, core: u8, id: u16) -> Vec<u8> {
        let mut frame = Vec::with_capacity(4);
        frame.push(opcode);
        frame.push(core);
        frame.extend_from_slice(&id.to_le_bytes());
        frame
    }

    /// Builds a core control request (halt / resume / step).
    pub fn core_request(opcode: u8, core: u8) -> Vec<u8> {
        vec![opcode, core]
    }
}
