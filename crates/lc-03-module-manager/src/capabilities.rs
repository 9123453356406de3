use serde::{Deserialize, Serialize};
use shared_types::LifecyclePhase;

bitflags::bitflags! {
    /// The lifecycle hooks and registrations a module exposes.
    ///
    /// Derived from the callbacks handed to `ModuleDescriptor`, never declared
    /// separately.
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[serde(transparent)]
    pub struct Capabilities: u32 {
        /// Has default/validate/init/export genesis callbacks.
        const GENESIS     = 0b0_0001;
        /// Runs at the start of every block.
        const BEGIN_BLOCK = 0b0_0010;
        /// Runs at the end of every block.
        const END_BLOCK   = 0b0_0100;
        /// Registers invariant routes.
        const INVARIANTS  = 0b0_1000;
        /// Registers message and query handlers.
        const SERVICES    = 0b1_0000;
    }
}

impl Capabilities {
    /// The capability a module needs to appear in the order for `phase`.
    #[must_use]
    pub fn for_phase(phase: LifecyclePhase) -> Self {
        match phase {
            LifecyclePhase::Genesis => Self::GENESIS,
            LifecyclePhase::BeginBlock => Self::BEGIN_BLOCK,
            LifecyclePhase::EndBlock => Self::END_BLOCK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_mapping() {
        assert_eq!(
            Capabilities::for_phase(LifecyclePhase::EndBlock),
            Capabilities::END_BLOCK
        );
        let caps = Capabilities::GENESIS | Capabilities::BEGIN_BLOCK;
        assert!(caps.contains(Capabilities::for_phase(LifecyclePhase::Genesis)));
        assert!(!caps.contains(Capabilities::for_phase(LifecyclePhase::EndBlock)));
    }
}
