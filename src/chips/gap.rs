//! GAP8: a fabric controller plus an eight core cluster.
//!
//! GAP8 boots with the FLL at its slow default; the attach sequence
//! programs the soc clock right after the handshake so the load phase does
//! not crawl.

use std::sync::Arc;
use std::time::Duration;

use crate::binary::BinarySet;
use crate::bridge::registers::RegisterSet;
use crate::bridge::Bridge;
use crate::chips::{handshake, ChipSequence};
use crate::config::memory::{MemoryRegion, PeripheralRegion, RamRegion};
use crate::config::{BridgeConfig, ChipParams};
use crate::error::Error;
use crate::transport::DebugTransport;

/// Base address of the soc FLL configuration register.
const FLL_SOC_CONF: u64 = 0x1A10_0004;

const L2_BASE: u64 = 0x1C00_0000;
const DEFAULT_L2_SIZE: u64 = 0x8_0000; // 512 KiB
const CLUSTER_L1_BASE: u64 = 0x1000_0000;
const CLUSTER_L1_SIZE: u64 = 0x1_0000; // 64 KiB
const FC_TCDM_BASE: u64 = 0x1B00_0000;
const FC_TCDM_SIZE: u64 = 0x4000; // 16 KiB
const APB_SOC_BASE: u64 = 0x1A10_0000;
const APB_SOC_SIZE: u64 = 0x10_0000;

const DEFAULT_CORE_COUNT: usize = 9; // FC + 8 cluster cores
const DEFAULT_CLOCK_HZ: u32 = 50_000_000;

/// The GAP8 debug sequence.
#[derive(Debug)]
pub struct GapSequence {
    core_count: usize,
    memory_map: Vec<MemoryRegion>,
    registers: RegisterSet,
    clock_hz: u32,
}

impl GapSequence {
    /// Builds the sequence from the builtin GAP8 tables, applying any
    /// overrides the configuration carries.
    pub fn from_params(params: &ChipParams) -> Self {
        let l2_size = params.l2_size.unwrap_or(DEFAULT_L2_SIZE);
        Self {
            core_count: params.core_count.unwrap_or(DEFAULT_CORE_COUNT),
            memory_map: vec![
                MemoryRegion::Ram(RamRegion {
                    name: "L2".into(),
                    range: L2_BASE..L2_BASE + l2_size,
                    is_boot_memory: true,
                }),
                MemoryRegion::Ram(RamRegion {
                    name: "L1 cluster".into(),
                    range: CLUSTER_L1_BASE..CLUSTER_L1_BASE + CLUSTER_L1_SIZE,
                    is_boot_memory: false,
                }),
                MemoryRegion::Ram(RamRegion {
                    name: "FC TCDM".into(),
                    range: FC_TCDM_BASE..FC_TCDM_BASE + FC_TCDM_SIZE,
                    is_boot_memory: false,
                }),
                MemoryRegion::Peripheral(PeripheralRegion {
                    name: "APB soc".into(),
                    range: APB_SOC_BASE..APB_SOC_BASE + APB_SOC_SIZE,
                }),
            ],
            registers: RegisterSet::riscv_debug_unit(),
            clock_hz: params.clock_hz.unwrap_or(DEFAULT_CLOCK_HZ),
        }
    }
}

impl ChipSequence for GapSequence {
    fn chip_name(&self) -> &'static str {
        "gap"
    }

    fn core_count(&self) -> usize {
        self.core_count
    }

    fn memory_map(&self) -> &[MemoryRegion] {
        &self.memory_map
    }

    fn registers(&self) -> &RegisterSet {
        &self.registers
    }

    fn reset_and_handshake(
        &self,
        link: &mut dyn DebugTransport,
        timeout: Duration,
    ) -> Result<(), Error> {
        link.reset_line(true)?;
        link.reset_line(false)?;
        handshake(self.chip_name(), link, timeout)?;

        tracing::debug!(clock_hz = self.clock_hz, "programming soc FLL");
        self.write_memory(link, FLL_SOC_CONF, &self.clock_hz.to_le_bytes(), timeout)
    }
}

pub(crate) fn bridge(config: BridgeConfig, binaries: BinarySet) -> Bridge {
    let sequence = GapSequence::from_params(&config.params);
    Bridge::new(Arc::new(sequence), config, binaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_overrides_builtin_tables() {
        let params = ChipParams {
            core_count: Some(5),
            l2_size: Some(0x4_0000),
            clock_hz: None,
        };
        let sequence = GapSequence::from_params(&params);
        assert_eq!(sequence.core_count(), 5);
        let l2 = sequence
            .memory_map()
            .iter()
            .find(|region| region.name() == "L2")
            .unwrap();
        assert_eq!(l2.range().end - l2.range().start, 0x4_0000);
    }
}
