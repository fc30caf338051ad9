//! The chip variant registry.
//!
//! Maps a configured chip identity onto the factory that constructs the
//! matching bridge implementation. Resolution is total: identities the
//! registry does not know fall back to the designated generic entry, so
//! chip variants can be added over the product's lifetime without touching
//! the callers.

use once_cell::sync::Lazy;

use crate::binary::BinarySet;
use crate::bridge::Bridge;
use crate::chips;
use crate::config::BridgeConfig;

/// Constructs an unattached bridge for one chip variant.
pub type BridgeFactory = fn(BridgeConfig, BinarySet) -> Bridge;

struct RegistryEntry {
    name: String,
    factory: BridgeFactory,
}

/// All the known chip variants plus the generic fallback.
pub struct Registry {
    entries: Vec<RegistryEntry>,
    generic: BridgeFactory,
}

impl Registry {
    /// Creates a registry populated with the builtin chip variants.
    pub fn from_builtin_chips() -> Self {
        let mut registry = Self {
            entries: Vec::new(),
            generic: chips::generic::bridge,
        };
        registry.register("gap", chips::gap::bridge);
        registry.register("fulmine", chips::fulmine::bridge);
        registry.register("wolfe", chips::wolfe::bridge);
        registry
    }

    /// Adds or overwrites the factory for `identity`.
    ///
    /// Registration happens once at process start; the registry is treated
    /// as read-only afterwards so it can be shared across threads.
    pub fn register(&mut self, identity: impl Into<String>, factory: BridgeFactory) {
        let identity = identity.into();
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.name.eq_ignore_ascii_case(&identity))
        {
            Some(entry) => entry.factory = factory,
            None => self.entries.push(RegistryEntry {
                name: identity,
                factory,
            }),
        }
    }

    /// Returns the factory registered for `identity`, or the generic
    /// fallback for identities the registry does not know. Never fails.
    pub fn resolve(&self, identity: &str) -> BridgeFactory {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(identity))
            .map(|entry| entry.factory)
            .unwrap_or(self.generic)
    }

    /// The designated fallback factory.
    pub fn generic(&self) -> BridgeFactory {
        self.generic
    }

    /// The names of all registered chip variants.
    pub fn chip_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }
}

/// The process-wide registry, initialized on first use from the builtin
/// chip table and read-only afterwards.
pub fn registry() -> &'static Registry {
    static REGISTRY: Lazy<Registry> = Lazy::new(Registry::from_builtin_chips);
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("gap", "gap")]
    #[test_case("GAP", "gap"; "identity lookup ignores case")]
    #[test_case("fulmine", "fulmine")]
    #[test_case("wolfe", "wolfe")]
    #[test_case("unknown-chip-123", "generic")]
    #[test_case("", "generic")]
    fn resolution_is_total(identity: &str, expected_chip: &str) {
        let factory = registry().resolve(identity);
        let bridge = factory(BridgeConfig::new(identity), BinarySet::new());
        assert_eq!(bridge.chip_name(), expected_chip);
    }

    #[test]
    fn register_overwrites_existing_entry() {
        let mut registry = Registry::from_builtin_chips();
        registry.register("gap", chips::generic::bridge);
        let bridge = registry.resolve("gap")(BridgeConfig::new("gap"), BinarySet::new());
        assert_eq!(bridge.chip_name(), "generic");
        assert_eq!(registry.chip_names().count(), 3);
    }
}
