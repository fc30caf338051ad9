//! The fallback bridge behavior for chip identities the registry does not
//! recognize: a single core and a permissive flat memory map, driven with
//! the default sequence only.

use std::sync::Arc;

use crate::binary::BinarySet;
use crate::bridge::registers::RegisterSet;
use crate::bridge::Bridge;
use crate::chips::ChipSequence;
use crate::config::memory::{MemoryRegion, RamRegion};
use crate::config::{BridgeConfig, ChipParams};

/// The generic debug sequence.
#[derive(Debug)]
pub struct GenericSequence {
    core_count: usize,
    memory_map: Vec<MemoryRegion>,
    registers: RegisterSet,
}

impl GenericSequence {
    /// Builds the fallback sequence; without chip tables the memory map is
    /// the whole 32 bit address space.
    pub fn from_params(params: &ChipParams) -> Self {
        Self {
            core_count: params.core_count.unwrap_or(1),
            memory_map: vec![MemoryRegion::Ram(RamRegion {
                name: "RAM".into(),
                range: 0..0x1_0000_0000,
                is_boot_memory: true,
            })],
            registers: RegisterSet::riscv_debug_unit(),
        }
    }
}

impl ChipSequence for GenericSequence {
    fn chip_name(&self) -> &'static str {
        "generic"
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
}

pub(crate) fn bridge(config: BridgeConfig, binaries: BinarySet) -> Bridge {
    let sequence = GenericSequence::from_params(&config.params);
    Bridge::new(Arc::new(sequence), config, binaries)
}
