//! Chip specific debug sequences.
//!
//! All chips of the family speak the same request framing over the debug
//! link; what differs between them is the reset/handshake sequence run
//! during attach, the memory map, the core count and whether their debug
//! unit arbitrates memory accesses while cores are running. The
//! [`ChipSequence`] trait carries default implementations for everything a
//! well behaved chip does; the per-chip modules override only the steps
//! their hardware does differently.

pub mod fulmine;
pub mod gap;
pub mod generic;
pub mod wolfe;

use std::fmt;
use std::time::Duration;

use crate::bridge::registers::{RegisterId, RegisterSet};
use crate::config::memory::MemoryRegion;
use crate::error::Error;
use crate::transport::{wire, DebugTransport};

/// Largest payload sent in one memory write request.
pub(crate) const WRITE_CHUNK_SIZE: usize = 1024;
/// Largest payload requested in one memory read request.
pub(crate) const READ_CHUNK_SIZE: usize = 1024;

/// The hardware-facing half of a bridge.
///
/// The shared state machine in [`Bridge`](crate::Bridge) performs all state
/// tracking and validation, then delegates the actual target interaction to
/// these hooks.
pub trait ChipSequence: Send + Sync + fmt::Debug {
    /// The identity this sequence implements, as spelled in configuration.
    fn chip_name(&self) -> &'static str;

    /// Number of cores the debug unit exposes. Never exceeds
    /// [`MAX_CORE_COUNT`](crate::config::MAX_CORE_COUNT); the configuration
    /// layer enforces the bound on overrides.
    fn core_count(&self) -> usize;

    /// The chip's memory map; the load bounds check runs against this.
    fn memory_map(&self) -> &[MemoryRegion];

    /// The register set the chip's debug unit declares.
    fn registers(&self) -> &RegisterSet;

    /// Whether the debug unit arbitrates memory and register accesses while
    /// cores are running. Chips without this capability only allow access
    /// while stopped.
    fn supports_live_access(&self) -> bool {
        false
    }

    /// Chip reset and debug handshake, run during `attach` and `reset`.
    ///
    /// The default pulses the reset line and performs the debug ROM
    /// handshake, which leaves every core halted.
    fn reset_and_handshake(
        &self,
        link: &mut dyn DebugTransport,
        timeout: Duration,
    ) -> Result<(), Error> {
        link.reset_line(true)?;
        link.reset_line(false)?;
        handshake(self.chip_name(), link, timeout)
    }

    /// Releases all cores from halt.
    fn resume_cores(&self, link: &mut dyn DebugTransport, timeout: Duration) -> Result<(), Error> {
        for core in 0..self.core_count() as u8 {
            link.send(&wire::core_request(wire::OP_RESUME, core))?;
            expect_ack(self.chip_name(), "run", link, timeout)?;
        }
        Ok(())
    }

    /// Halts all cores, preserving register and memory state.
    fn halt_cores(&self, link: &mut dyn DebugTransport, timeout: Duration) -> Result<(), Error> {
        for core in 0..self.core_count() as u8 {
            link.send(&wire::core_request(wire::OP_HALT, core))?;
            expect_ack(self.chip_name(), "stop", link, timeout)?;
        }
        Ok(())
    }

    /// Executes exactly one instruction on a halted core.
    fn step_core(
        &self,
        link: &mut dyn DebugTransport,
        core: u8,
        timeout: Duration,
    ) -> Result<(), Error> {
        link.send(&wire::core_request(wire::OP_STEP, core))?;
        expect_ack(self.chip_name(), "step", link, timeout)
    }

    /// Reads target memory into `data`.
    fn read_memory(
        &self,
        link: &mut dyn DebugTransport,
        address: u64,
        data: &mut [u8],
        timeout: Duration,
    ) -> Result<(), Error> {
        check_span(self.chip_name(), address, data.len())?;
        for (index, chunk) in data.chunks_mut(READ_CHUNK_SIZE).enumerate() {
            let chunk_address = address + (index * READ_CHUNK_SIZE) as u64;
            link.send(&wire::memory_request(
                wire::OP_READ_MEM,
                chunk_address,
                chunk.len() as u32,
            ))?;
            let reply = link.receive(chunk.len(), timeout)?;
            chunk.copy_from_slice(&reply);
        }
        Ok(())
    }

    /// Writes `data` to target memory.
    fn write_memory(
        &self,
        link: &mut dyn DebugTransport,
        address: u64,
        data: &[u8],
        timeout: Duration,
    ) -> Result<(), Error> {
        check_span(self.chip_name(), address, data.len())?;
        for (index, chunk) in data.chunks(WRITE_CHUNK_SIZE).enumerate() {
            let chunk_address = address + (index * WRITE_CHUNK_SIZE) as u64;
            let mut frame =
                wire::memory_request(wire::OP_WRITE_MEM, chunk_address, chunk.len() as u32);
            frame.extend_from_slice(chunk);
            link.send(&frame)?;
            expect_ack(self.chip_name(), "write_memory", link, timeout)?;
        }
        Ok(())
    }

    /// Reads a debug unit register of `core`.
    fn read_register(
        &self,
        link: &mut dyn DebugTransport,
        core: u8,
        id: RegisterId,
        timeout: Duration,
    ) -> Result<u64, Error> {
        link.send(&wire::register_request(wire::OP_READ_REG, core, id.0))?;
        let reply = link.receive(8, timeout)?;
        let bytes: [u8; 8] = reply.as_slice().try_into().map_err(|_| Error::Protocol {
            chip: self.chip_name().to_string(),
            operation: "read_register",
            message: format!("register reply of {} bytes", reply.len()),
        })?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Writes a debug unit register of `core`.
    fn write_register(
        &self,
        link: &mut dyn DebugTransport,
        core: u8,
        id: RegisterId,
        value: u64,
        timeout: Duration,
    ) -> Result<(), Error> {
        let mut frame = wire::register_request(wire::OP_WRITE_REG, core, id.0);
        frame.extend_from_slice(&value.to_le_bytes());
        link.send(&frame)?;
        expect_ack(self.chip_name(), "write_register", link, timeout)
    }
}

/// Rejects accesses whose end would wrap past the top of the address
/// space; with the span checked, the per-chunk address arithmetic below
/// it cannot overflow.
pub(crate) fn check_span(chip: &str, address: u64, len: usize) -> Result<(), Error> {
    if address.checked_add(len as u64).is_none() {
        return Err(Error::OutOfRange {
            chip: chip.to_string(),
            address,
            length: len as u64,
        });
    }
    Ok(())
}

/// Performs the debug ROM handshake and verifies the magic reply.
pub(crate) fn handshake(
    chip: &str,
    link: &mut dyn DebugTransport,
    timeout: Duration,
) -> Result<(), Error> {
    link.send(&[wire::OP_HANDSHAKE])?;
    let reply = link.receive(wire::HANDSHAKE_MAGIC.len(), timeout)?;
    if reply != wire::HANDSHAKE_MAGIC {
        return Err(Error::Protocol {
            chip: chip.to_string(),
            operation: "attach",
            message: format!("unexpected handshake reply {reply:02x?}"),
        });
    }
    tracing::debug!(chip, "debug handshake complete");
    Ok(())
}

/// Receives one reply byte and checks it is a positive acknowledge.
pub(crate) fn expect_ack(
    chip: &str,
    operation: &'static str,
    link: &mut dyn DebugTransport,
    timeout: Duration,
) -> Result<(), Error> {
    let reply = link.receive(1, timeout)?;
    if reply != [wire::ACK] {
        return Err(Error::Protocol {
            chip: chip.to_string(),
            operation,
            message: format!("expected ACK, got {reply:02x?}"),
        });
    }
    Ok(())
}
