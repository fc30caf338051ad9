//! Mr. Wolf: a fabric controller plus an eight core cluster.
//!
//! Wolfe's debug unit arbitrates memory accesses against the running
//! cores, so memory and registers stay accessible without halting first.

use std::sync::Arc;

use crate::binary::BinarySet;
use crate::bridge::registers::RegisterSet;
use crate::bridge::Bridge;
use crate::chips::ChipSequence;
use crate::config::memory::{MemoryRegion, PeripheralRegion, RamRegion};
use crate::config::{BridgeConfig, ChipParams};

const L2_BASE: u64 = 0x1C00_0000;
const DEFAULT_L2_SIZE: u64 = 0x8_0000; // 512 KiB
const CLUSTER_L1_BASE: u64 = 0x1000_0000;
const CLUSTER_L1_SIZE: u64 = 0x1_0000; // 64 KiB
const APB_SOC_BASE: u64 = 0x1A10_0000;
const APB_SOC_SIZE: u64 = 0x10_0000;

const DEFAULT_CORE_COUNT: usize = 9; // FC + 8 cluster cores

/// The Mr. Wolf debug sequence.
#[derive(Debug)]
pub struct WolfeSequence {
    core_count: usize,
    memory_map: Vec<MemoryRegion>,
    registers: RegisterSet,
}

impl WolfeSequence {
    /// Builds the sequence from the builtin Mr. Wolf tables, applying any
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
                MemoryRegion::Peripheral(PeripheralRegion {
                    name: "APB soc".into(),
                    range: APB_SOC_BASE..APB_SOC_BASE + APB_SOC_SIZE,
                }),
            ],
            registers: RegisterSet::riscv_debug_unit(),
        }
    }
}

impl ChipSequence for WolfeSequence {
    fn chip_name(&self) -> &'static str {
        "wolfe"
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

    fn supports_live_access(&self) -> bool {
        true
    }
}

pub(crate) fn bridge(config: BridgeConfig, binaries: BinarySet) -> Bridge {
    let sequence = WolfeSequence::from_params(&config.params);
    Bridge::new(Arc::new(sequence), config, binaries)
}
