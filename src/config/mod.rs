//! Target description handling: the configuration query interface, the
//! chip-variant registry and the memory map types.

pub mod memory;
pub mod registry;
pub mod tree;

pub use memory::{MemoryRange, MemoryRegion, PeripheralRegion, RamRegion};
pub use registry::{registry, BridgeFactory, Registry};
pub use tree::{ConfigQuery, ConfigTree, NodeHandle};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upper bound on one link round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Cores are addressed by a single byte in the debug link framing.
pub const MAX_CORE_COUNT: usize = 255;

/// Errors while extracting the target description from the system
/// configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No chip declaration node was found.
    #[error("No '{pattern}' node found in the system configuration")]
    ChipNodeMissing {
        /// The path pattern that was searched for.
        pattern: &'static str,
    },
    /// More than one chip declaration node was found.
    #[error("{count} nodes match '{pattern}'; the target description is ambiguous")]
    ChipNodeAmbiguous {
        /// The path pattern that was searched for.
        pattern: &'static str,
        /// How many nodes matched.
        count: usize,
    },
    /// The chip declaration node has no usable `name` field.
    #[error("The chip declaration does not name a chip")]
    ChipNameMissing,
    /// A target parameter could not be parsed.
    #[error("Configuration field '{name}' has unusable value '{value}'")]
    InvalidField {
        /// Name of the field.
        name: &'static str,
        /// The raw value found in the configuration.
        value: String,
    },
    /// The configuration text was not valid YAML.
    #[error("The configuration could not be parsed")]
    Yaml(#[from] serde_yaml::Error),
}

/// Target specific parameters read from the chip declaration node.
///
/// All parameters are optional; chips fall back to their builtin tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipParams {
    /// Overrides the chip's builtin core count.
    pub core_count: Option<usize>,
    /// Overrides the size of the chip's L2 memory in bytes.
    pub l2_size: Option<u64>,
    /// The SoC clock in Hz, used by chips that program a PLL during attach.
    pub clock_hz: Option<u32>,
}

impl ChipParams {
    /// Reads the parameters off a chip declaration node.
    pub fn from_node(config: &dyn ConfigQuery, node: NodeHandle) -> Result<Self, ConfigError> {
        let core_count: Option<usize> = parse_field(config, node, "core_count")?;
        if let Some(count) = core_count {
            if count > MAX_CORE_COUNT {
                return Err(ConfigError::InvalidField {
                    name: "core_count",
                    value: count.to_string(),
                });
            }
        }
        Ok(Self {
            core_count,
            l2_size: parse_field(config, node, "l2_size")?,
            clock_hz: parse_field(config, node, "clock_hz")?,
        })
    }
}

fn parse_field<T: Integer>(
    config: &dyn ConfigQuery,
    node: NodeHandle,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = config.field(node, name) else {
        return Ok(None);
    };
    T::parse(value.trim())
        .map(Some)
        .ok_or(ConfigError::InvalidField { name, value })
}

/// Integer parsing for configuration scalars, accepting `0x` prefixed hex.
trait Integer: Sized {
    fn parse(value: &str) -> Option<Self>;
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {$(
        impl Integer for $ty {
            fn parse(value: &str) -> Option<Self> {
                if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
                    <$ty>::from_str_radix(hex, 16).ok()
                } else {
                    value.parse().ok()
                }
            }
        }
    )*};
}

impl_integer!(usize, u64, u32);

/// An immutable snapshot of everything a bridge needs to know about its
/// target, consumed at construction time.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The configured chip identity.
    pub chip: String,
    /// Target specific parameters.
    pub params: ChipParams,
    /// Emit human readable progress output for each protocol step.
    pub verbose: bool,
    /// Upper bound on one link round trip.
    pub request_timeout: Duration,
}

impl BridgeConfig {
    /// Creates a configuration with default parameters for `chip`.
    pub fn new(chip: impl Into<String>) -> Self {
        Self {
            chip: chip.into(),
            params: ChipParams::default(),
            verbose: false,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the verbosity flag.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Sets the link round trip timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
