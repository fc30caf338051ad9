//! Register descriptions for the PULP debug unit.
//!
//! Each chip declares the set of registers its debug unit exposes; register
//! accesses are validated against that set before anything is sent over the
//! debug link.

use std::fmt;

/// The location of a CPU register. This is not a memory address, but the
/// register index the target's debug unit uses to address the register.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct RegisterId(pub u16);

impl From<u16> for RegisterId {
    fn from(value: u16) -> Self {
        RegisterId(value)
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// The role a register plays for the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterRole {
    /// A general purpose register.
    General,
    /// The program counter of the halted core.
    ProgramCounter,
    /// The address of the next instruction to execute.
    NextProgramCounter,
    /// The trap/exception cause register.
    Cause,
}

/// Describes a register with its properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDescription {
    pub(crate) name: &'static str,
    pub(crate) id: RegisterId,
    pub(crate) role: RegisterRole,
}

impl RegisterDescription {
    /// The display name of this register.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The id the debug unit addresses this register by.
    pub fn id(&self) -> RegisterId {
        self.id
    }

    /// The role of this register.
    pub fn role(&self) -> RegisterRole {
        self.role
    }
}

impl From<&RegisterDescription> for RegisterId {
    fn from(description: &RegisterDescription) -> RegisterId {
        description.id
    }
}

/// The full set of registers a chip's debug unit declares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSet {
    registers: Vec<RegisterDescription>,
}

/// Register ids of the RISC-V flavoured PULP debug unit.
const RISCV_GPR_COUNT: u16 = 32;
const RISCV_PC_ID: u16 = 32;
const RISCV_NPC_ID: u16 = 33;
const RISCV_CAUSE_ID: u16 = 34;

static RISCV_GPR_NAMES: [&str; 32] = [
    "x0", "x1", "x2", "x3", "x4", "x5", "x6", "x7", "x8", "x9", "x10", "x11", "x12", "x13", "x14",
    "x15", "x16", "x17", "x18", "x19", "x20", "x21", "x22", "x23", "x24", "x25", "x26", "x27",
    "x28", "x29", "x30", "x31",
];

impl RegisterSet {
    /// The register file of the RISC-V PULP debug unit: `x0`-`x31` plus the
    /// PC, NPC and cause registers.
    pub fn riscv_debug_unit() -> Self {
        let mut registers: Vec<_> = (0..RISCV_GPR_COUNT)
            .map(|index| RegisterDescription {
                name: RISCV_GPR_NAMES[index as usize],
                id: RegisterId(index),
                role: RegisterRole::General,
            })
            .collect();
        registers.push(RegisterDescription {
            name: "pc",
            id: RegisterId(RISCV_PC_ID),
            role: RegisterRole::ProgramCounter,
        });
        registers.push(RegisterDescription {
            name: "npc",
            id: RegisterId(RISCV_NPC_ID),
            role: RegisterRole::NextProgramCounter,
        });
        registers.push(RegisterDescription {
            name: "cause",
            id: RegisterId(RISCV_CAUSE_ID),
            role: RegisterRole::Cause,
        });
        Self { registers }
    }

    /// Looks up a register by id.
    pub fn get(&self, id: RegisterId) -> Option<&RegisterDescription> {
        self.registers.iter().find(|register| register.id == id)
    }

    /// Whether `id` is part of this register set.
    pub fn contains(&self, id: RegisterId) -> bool {
        self.get(id).is_some()
    }

    /// The program counter register.
    pub fn program_counter(&self) -> &RegisterDescription {
        self.registers
            .iter()
            .find(|register| register.role == RegisterRole::ProgramCounter)
            .expect("a register set always declares a program counter")
    }

    /// Iterates over all registers in the set.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescription> {
        self.registers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn riscv_debug_unit_register_file() {
        let set = RegisterSet::riscv_debug_unit();
        assert!(set.contains(RegisterId(0)));
        assert!(set.contains(RegisterId(31)));
        assert_eq!(set.program_counter().id(), RegisterId(32));
        assert!(!set.contains(RegisterId(35)));
        assert_eq!(set.get(RegisterId(2)).unwrap().name(), "x2");
    }
}
