//! # Debug bridge for PULP multi-core chips
//!
//! This crate connects a development workstation to a PULP family chip for
//! loading binaries, controlling execution and inspecting target state
//! during bring-up. Chip variants differ in boot sequences, memory maps and
//! transport quirks; the bridge hides that behind one uniform control
//! interface and dispatches to the chip specific implementation selected
//! from the system configuration.
//!
//! # Examples
//!
//! ## Loading and starting a program
//!
//! ```no_run
//! use pulp_bridge::{create_bridge, BinaryImage, BinarySet, ConfigTree, FakeTransport};
//!
//! # fn main() -> Result<(), pulp_bridge::Error> {
//! let config = ConfigTree::from_yaml_str(
//!     "board:\n  pulp_chip:\n    name: gap\n",
//! )?;
//!
//! let mut binaries = BinarySet::new();
//! binaries.push(BinaryImage::new(0x1C00_0000, vec![0u8; 64]).with_entry_point(0x1C00_0000));
//!
//! // Construct the chip specific bridge; nothing touches hardware yet.
//! let mut bridge = create_bridge(&config, binaries, false)?;
//!
//! // Attach over a transport (a real JTAG adapter in production).
//! bridge.attach(Box::new(FakeTransport::new()))?;
//!
//! // Load the images and run from the entry point.
//! bridge.load()?;
//! bridge.start()?;
//!
//! // Halt again and inspect.
//! bridge.stop()?;
//! let word = bridge.read_word_32(0x1C00_0000)?;
//! bridge.detach()?;
//! # Ok(())
//! # }
//! ```
//!
//! The crate is built around the [`Bridge`] handle, the [`ChipSequence`]
//! trait chip variants implement, and the [`Registry`] that maps configured
//! chip identities onto bridge factories.

#![warn(missing_docs)]

pub mod binary;
mod bridge;
pub mod chips;
pub mod config;
mod error;
mod transport;

pub use crate::binary::{BinaryImage, BinarySet};
pub use crate::bridge::{
    registers::{RegisterDescription, RegisterId, RegisterRole, RegisterSet},
    Bridge, BridgeState, RunState,
};
pub use crate::chips::ChipSequence;
pub use crate::config::{
    registry, BridgeConfig, ChipParams, ConfigError, ConfigQuery, ConfigTree, MemoryRegion,
    NodeHandle, Registry,
};
pub use crate::error::Error;
pub use crate::transport::{fake::FakeTransport, DebugTransport, TransportError};

/// The configuration path pattern naming the chip declaration node.
pub const CHIP_NODE_PATTERN: &str = "**/pulp_chip";

/// Constructs the bridge for the chip declared in `config`.
///
/// This is the sole public entry point: it locates the unique `pulp_chip`
/// node in the system configuration, reads the declared chip name, resolves
/// the matching factory in the process-wide [`Registry`] (falling back to
/// the generic implementation for unknown identities) and returns the
/// constructed, unattached [`Bridge`]. No hardware is touched.
///
/// Fails with [`Error::Configuration`] if the chip declaration is missing,
/// ambiguous or unnamed.
#[tracing::instrument(skip(config, binaries))]
pub fn create_bridge(
    config: &dyn ConfigQuery,
    binaries: BinarySet,
    verbose: bool,
) -> Result<Bridge, Error> {
    let nodes = config.find(CHIP_NODE_PATTERN);
    let node = match nodes.as_slice() {
        [] => {
            return Err(ConfigError::ChipNodeMissing {
                pattern: CHIP_NODE_PATTERN,
            }
            .into())
        }
        [node] => *node,
        _ => {
            return Err(ConfigError::ChipNodeAmbiguous {
                pattern: CHIP_NODE_PATTERN,
                count: nodes.len(),
            }
            .into())
        }
    };

    let chip = config
        .field(node, "name")
        .filter(|name| !name.trim().is_empty())
        .ok_or(ConfigError::ChipNameMissing)?;
    let params = ChipParams::from_node(config, node)?;

    let bridge_config = BridgeConfig {
        chip: chip.clone(),
        params,
        verbose,
        request_timeout: config::DEFAULT_REQUEST_TIMEOUT,
    };

    let factory = registry().resolve(&chip);
    let bridge = factory(bridge_config, binaries);
    tracing::debug!(
        configured = chip,
        implementation = bridge.chip_name(),
        "selected bridge implementation"
    );
    Ok(bridge)
}
