use serde::{Deserialize, Serialize};

/// Represents a RAM region of the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RamRegion {
    /// Name of the region, e.g. `L2` or `L1`.
    pub name: String,
    /// Address range of the region.
    pub range: core::ops::Range<u64>,
    /// True if the region holds the boot code after reset.
    pub is_boot_memory: bool,
}

/// Represents a memory mapped peripheral region of the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeripheralRegion {
    /// Name of the region, e.g. `APB SoC`.
    pub name: String,
    /// Address range of the region.
    pub range: core::ops::Range<u64>,
}

/// Declares the type of a memory region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryRegion {
    /// RAM, the only region kind program images may be loaded into.
    Ram(RamRegion),
    /// Memory mapped peripherals; readable and writable, never a load target.
    Peripheral(PeripheralRegion),
}

impl MemoryRegion {
    /// The address range covered by this region.
    pub fn range(&self) -> &core::ops::Range<u64> {
        match self {
            MemoryRegion::Ram(region) => &region.range,
            MemoryRegion::Peripheral(region) => &region.range,
        }
    }

    /// The name of this region.
    pub fn name(&self) -> &str {
        match self {
            MemoryRegion::Ram(region) => &region.name,
            MemoryRegion::Peripheral(region) => &region.name,
        }
    }

    /// True if program images may be loaded into this region.
    pub fn is_loadable(&self) -> bool {
        matches!(self, MemoryRegion::Ram(_))
    }
}

/// Enables the user to do range containment testing.
pub trait MemoryRange {
    /// Returns true if `self` contains `range` fully.
    fn contains_range(&self, range: &core::ops::Range<u64>) -> bool;
    /// Returns true if `self` and `range` overlap in at least one address.
    fn intersects_range(&self, range: &core::ops::Range<u64>) -> bool;
}

impl MemoryRange for core::ops::Range<u64> {
    fn contains_range(&self, range: &core::ops::Range<u64>) -> bool {
        if range.is_empty() {
            return self.contains(&range.start);
        }
        self.contains(&range.start) && self.contains(&(range.end - 1))
    }

    fn intersects_range(&self, range: &core::ops::Range<u64>) -> bool {
        if self.is_empty() || range.is_empty() {
            return false;
        }
        self.start < range.end && range.start < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_containment() {
        let l2 = 0x1C00_0000u64..0x1C08_0000;
        assert!(l2.contains_range(&(0x1C00_1000..0x1C00_2000)));
        assert!(l2.contains_range(&(0x1C00_0000..0x1C08_0000)));
        assert!(!l2.contains_range(&(0x1C07_F000..0x1C08_1000)));
        assert!(l2.intersects_range(&(0x1C07_F000..0x1C08_1000)));
        assert!(!l2.intersects_range(&(0x2000_0000..0x2000_1000)));
        // A range enclosing the region on both sides still overlaps it.
        assert!(l2.intersects_range(&(0x1000_0000..0x2000_0000)));
    }

    #[test]
    fn only_ram_is_loadable() {
        let ram = MemoryRegion::Ram(RamRegion {
            name: "L2".into(),
            range: 0x1C00_0000..0x1C08_0000,
            is_boot_memory: true,
        });
        let apb = MemoryRegion::Peripheral(PeripheralRegion {
            name: "APB SoC".into(),
            range: 0x1A10_0000..0x1A20_0000,
        });
        assert!(ram.is_loadable());
        assert!(!apb.is_loadable());
    }
}
