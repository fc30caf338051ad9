//! Fulmine: a four core cluster without a separate fabric controller.
//!
//! Fulmine evaluation boards latch the reset line through the power
//! sequencer; pulsing it from the debug adapter wedges the board, so the
//! attach sequence performs the handshake against whatever state the chip
//! is in.

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

const L2_BASE: u64 = 0x1C00_0000;
const DEFAULT_L2_SIZE: u64 = 0x3_0000; // 192 KiB
const TCDM_BASE: u64 = 0x1000_0000;
const TCDM_SIZE: u64 = 0x1_0000; // 64 KiB
const APB_SOC_BASE: u64 = 0x1A10_0000;
const APB_SOC_SIZE: u64 = 0x10_0000;

const DEFAULT_CORE_COUNT: usize = 4;

/// The Fulmine debug sequence.
#[derive(Debug)]
pub struct FulmineSequence {
    core_count: usize,
    memory_map: Vec<MemoryRegion>,
    registers: RegisterSet,
}

impl FulmineSequence {
    /// Builds the sequence from the builtin Fulmine tables, applying any
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
                    name: "TCDM".into(),
                    range: TCDM_BASE..TCDM_BASE + TCDM_SIZE,
                    is_boot_memory: false,
                }),
                MemoryRegion::Peripheral(PeripheralRegion {
                    name: "APB soc".into(),
                    range: APB_SOC_BASE..APB_SOC_BASE + APB_SOC_SIZE,
                }),
            ],
            registers: RegisterSet::riscv_debug_unit(),
        }
    }
}

impl ChipSequence for FulmineSequence {
    fn chip_name(&self) -> &'static str {
        "fulmine"
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
        // No reset line pulse, see the module docs.
        handshake(self.chip_name(), link, timeout)
    }
}

pub(crate) fn bridge(config: BridgeConfig, binaries: BinarySet) -> Bridge {
    let sequence = FulmineSequence::from_params(&config.params);
    Bridge::new(Arc::new(sequence), config, binaries)
}
