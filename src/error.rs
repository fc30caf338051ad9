use thiserror::Error;

use crate::bridge::registers::RegisterId;
use crate::bridge::BridgeState;
use crate::config::ConfigError;
use crate::transport::TransportError;

/// The overarching error type of this crate.
///
/// Every fallible bridge operation reports one of these variants; nothing is
/// retried or substituted internally, except the documented fallback to the
/// generic chip implementation during bridge selection.
#[derive(Error, Debug)]
pub enum Error {
    /// The system configuration does not describe a usable target.
    #[error("The target configuration is not usable")]
    Configuration(#[from] ConfigError),
    /// The physical debug link failed or timed out.
    #[error("An error occurred on the debug link")]
    Transport(#[from] TransportError),
    /// The target sent a reply the chip implementation could not make sense of.
    #[error("Chip '{chip}' sent a malformed reply during {operation}: {message}")]
    Protocol {
        /// The chip the bridge was constructed for.
        chip: String,
        /// The capability operation that was running.
        operation: &'static str,
        /// What exactly was wrong with the reply.
        message: String,
    },
    /// An address range does not fit the chip's address or memory map.
    #[error(
        "The {length} byte range at {address:#010x} does not fit into the address map of chip '{chip}'"
    )]
    OutOfRange {
        /// The chip whose address map rejected the access.
        chip: String,
        /// Start address of the offending range.
        address: u64,
        /// Length of the offending range in bytes.
        length: u64,
    },
    /// A capability operation was invoked in a state that does not allow it.
    #[error("Operation '{operation}' is not valid while the bridge is {state}")]
    InvalidState {
        /// The operation that was rejected.
        operation: &'static str,
        /// The state the bridge was in at the time.
        state: BridgeState,
    },
    /// A register id outside the chip's declared register set was used.
    #[error("Register {id} is not part of chip '{chip}'s register set")]
    UnknownRegister {
        /// The chip whose register set was consulted.
        chip: String,
        /// The offending register id.
        id: RegisterId,
    },
    /// Any other error, e.g. out of an externally registered chip variant.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
