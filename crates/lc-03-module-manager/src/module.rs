//! # Module Descriptors
//!
//! A module is described by its name, consensus version, the modules whose
//! keepers it needs, and one handler per capability. Handlers are separate
//! traits so a module only implements what it takes part in.

use std::fmt;
use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::{BlockHeader, ConfigError, ModuleError, ValidatorUpdate, VoteInfo};

use crate::capabilities::Capabilities;
use crate::invariants::InvariantRegistry;
use crate::services::Configurator;

/// Input to every begin-block callback.
#[derive(Debug, Clone, Default)]
pub struct BeginBlockRequest {
    pub header: BlockHeader,
    /// Votes on the previous block, in consensus order.
    pub last_commit_info: Vec<VoteInfo>,
}

/// Input to every end-block callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndBlockRequest {
    pub height: u64,
}

/// Genesis participation.
pub trait GenesisHandler: Send + Sync {
    /// The module's default genesis state.
    fn default_genesis(&self) -> serde_json::Value;

    /// Stateless check of a genesis payload. Runs before any module's
    /// `init_genesis`.
    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError>;

    /// Write the initial state into the module's own partition.
    fn init_genesis(
        &self,
        ctx: &mut Context,
        state: &serde_json::Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError>;

    /// Read the module's state back as a genesis payload.
    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError>;
}

pub trait BeginBlocker: Send + Sync {
    fn begin_block(&self, ctx: &mut Context, req: &BeginBlockRequest) -> Result<(), ModuleError>;
}

pub trait EndBlocker: Send + Sync {
    fn end_block(
        &self,
        ctx: &mut Context,
        req: &EndBlockRequest,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError>;
}

pub trait InvariantRegistrar: Send + Sync {
    fn register_invariants(&self, registry: &mut InvariantRegistry) -> Result<(), ConfigError>;
}

pub trait ServiceRegistrar: Send + Sync {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError>;
}

/// Everything the manager knows about one module.
#[derive(Clone)]
pub struct ModuleDescriptor {
    name: String,
    consensus_version: u64,
    dependencies: Vec<String>,
    pub(crate) genesis: Option<Arc<dyn GenesisHandler>>,
    pub(crate) begin_block: Option<Arc<dyn BeginBlocker>>,
    pub(crate) end_block: Option<Arc<dyn EndBlocker>>,
    pub(crate) invariants: Option<Arc<dyn InvariantRegistrar>>,
    pub(crate) services: Option<Arc<dyn ServiceRegistrar>>,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consensus_version: 1,
            dependencies: Vec::new(),
            genesis: None,
            begin_block: None,
            end_block: None,
            invariants: None,
            services: None,
        }
    }

    #[must_use]
    pub fn consensus_version(mut self, version: u64) -> Self {
        self.consensus_version = version;
        self
    }

    /// Declare that this module's keeper needs `module`'s keeper.
    #[must_use]
    pub fn depends_on(mut self, module: impl Into<String>) -> Self {
        self.dependencies.push(module.into());
        self
    }

    #[must_use]
    pub fn with_genesis(mut self, handler: Arc<dyn GenesisHandler>) -> Self {
        self.genesis = Some(handler);
        self
    }

    #[must_use]
    pub fn with_begin_block(mut self, handler: Arc<dyn BeginBlocker>) -> Self {
        self.begin_block = Some(handler);
        self
    }

    #[must_use]
    pub fn with_end_block(mut self, handler: Arc<dyn EndBlocker>) -> Self {
        self.end_block = Some(handler);
        self
    }

    #[must_use]
    pub fn with_invariants(mut self, handler: Arc<dyn InvariantRegistrar>) -> Self {
        self.invariants = Some(handler);
        self
    }

    #[must_use]
    pub fn with_services(mut self, handler: Arc<dyn ServiceRegistrar>) -> Self {
        self.services = Some(handler);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.consensus_version
    }

    #[must_use]
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::GENESIS, self.genesis.is_some());
        caps.set(Capabilities::BEGIN_BLOCK, self.begin_block.is_some());
        caps.set(Capabilities::END_BLOCK, self.end_block.is_some());
        caps.set(Capabilities::INVARIANTS, self.invariants.is_some());
        caps.set(Capabilities::SERVICES, self.services.is_some());
        caps
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("consensus_version", &self.consensus_version)
            .field("dependencies", &self.dependencies)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl BeginBlocker for Noop {
        fn begin_block(&self, _: &mut Context, _: &BeginBlockRequest) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    #[test]
    fn test_capabilities_follow_callbacks() {
        let bare = ModuleDescriptor::new("params");
        assert_eq!(bare.capabilities(), Capabilities::empty());

        let d = ModuleDescriptor::new("mint")
            .consensus_version(2)
            .depends_on("bank")
            .with_begin_block(Arc::new(Noop));
        assert_eq!(d.capabilities(), Capabilities::BEGIN_BLOCK);
        assert_eq!(d.version(), 2);
        assert_eq!(d.dependencies(), ["bank".to_string()]);
    }
}
