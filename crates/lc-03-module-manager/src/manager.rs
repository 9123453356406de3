//! # Module Manager
//!
//! Single owner of the module set, the three lifecycle orders and the
//! lifecycle state. Every callback runs on the caller's `Context`; the
//! manager never opens stores itself.
//!
//! ## Genesis Policy
//!
//! Genesis is validated in full before any `init_genesis` runs:
//!
//! 1. every payload key must name a module with the `GENESIS` capability
//! 2. every `GENESIS` module must have a payload
//! 3. every payload must pass its module's `validate_genesis`
//!
//! The callbacks then run in genesis order inside a single revertible layer.
//! A failing callback discards the writes of every module before it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use lc_01_state_store::Context;
use shared_types::{
    ConfigError, GenesisError, LifecycleError, LifecyclePhase, ModuleEvent, ValidatorUpdate,
};
use tracing::{debug, error, info, instrument};

use crate::capabilities::Capabilities;
use crate::invariants::InvariantRegistry;
use crate::module::{BeginBlockRequest, EndBlockRequest, ModuleDescriptor};
use crate::services::Configurator;

/// Raw genesis application state: module name → payload.
pub type GenesisState = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    Constructed,
    GenesisRun,
    InBlock,
    BlockEnded,
    /// A lifecycle callback failed. Terminal.
    Halted,
}

impl fmt::Display for ManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Aggregated output of the end-block phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndBlockOutcome {
    /// Concatenated in end-block order.
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<ModuleEvent>,
}

pub struct ModuleManager {
    modules: BTreeMap<String, ModuleDescriptor>,
    /// Registration order, used wherever no lifecycle order applies.
    registration: Vec<String>,
    orders: BTreeMap<LifecyclePhase, Vec<String>>,
    state: ManagerState,
}

impl ModuleManager {
    /// Register the module set.
    ///
    /// Descriptors must be given in construction order: a module may only
    /// depend on modules registered before it.
    #[instrument(skip_all, fields(modules = descriptors.len()))]
    pub fn new(descriptors: Vec<ModuleDescriptor>) -> Result<Self, ConfigError> {
        let all: BTreeSet<&str> = descriptors.iter().map(ModuleDescriptor::name).collect();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for d in &descriptors {
            if seen.contains(d.name()) {
                return Err(ConfigError::DuplicateModule(d.name().to_string()));
            }
            for dep in d.dependencies() {
                if !all.contains(dep.as_str()) {
                    return Err(ConfigError::UnresolvedDependency {
                        module: d.name().to_string(),
                        dependency: dep.clone(),
                    });
                }
                if !seen.contains(dep) {
                    return Err(ConfigError::ForwardDependency {
                        module: d.name().to_string(),
                        dependency: dep.clone(),
                    });
                }
            }
            seen.insert(d.name().to_string());
        }

        let registration: Vec<String> = descriptors.iter().map(|d| d.name().to_string()).collect();
        let modules = descriptors
            .into_iter()
            .map(|d| (d.name().to_string(), d))
            .collect();
        info!("[Manager] Registered {} module(s)", registration.len());
        Ok(Self {
            modules,
            registration,
            orders: BTreeMap::new(),
            state: ManagerState::Constructed,
        })
    }

    /// Set the order for `phase`. It must list every module with the phase's
    /// capability exactly once, and nothing else.
    pub fn set_order(&mut self, phase: LifecyclePhase, names: &[&str]) -> Result<(), ConfigError> {
        if self.state != ManagerState::Constructed {
            return Err(ConfigError::Invalid(format!(
                "{phase} order cannot change in state {}",
                self.state
            )));
        }
        let required = Capabilities::for_phase(phase);
        let mut listed = BTreeSet::new();
        for name in names {
            let module = self
                .modules
                .get(*name)
                .ok_or_else(|| ConfigError::OrderUnknownModule {
                    phase,
                    module: (*name).to_string(),
                })?;
            if !module.capabilities().contains(required) {
                return Err(ConfigError::OrderCapabilityMismatch {
                    phase,
                    module: (*name).to_string(),
                });
            }
            if !listed.insert(*name) {
                return Err(ConfigError::OrderDuplicate {
                    phase,
                    module: (*name).to_string(),
                });
            }
        }
        if let Some(missing) = self
            .registration
            .iter()
            .find(|n| self.modules[*n].capabilities().contains(required) && !listed.contains(n.as_str()))
        {
            return Err(ConfigError::OrderMissingModule {
                phase,
                module: missing.clone(),
            });
        }

        debug!("[Manager] {} order: {:?}", phase, names);
        self.orders
            .insert(phase, names.iter().map(|n| (*n).to_string()).collect());
        Ok(())
    }

    /// Every phase must have an order before the first lifecycle call.
    pub fn assert_orders_complete(&self) -> Result<(), ConfigError> {
        for phase in [
            LifecyclePhase::Genesis,
            LifecyclePhase::BeginBlock,
            LifecyclePhase::EndBlock,
        ] {
            if !self.orders.contains_key(&phase) {
                return Err(ConfigError::OrderNotSet(phase));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn order(&self, phase: LifecyclePhase) -> Option<&[String]> {
        self.orders.get(&phase).map(Vec::as_slice)
    }

    #[must_use]
    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Module names in registration order.
    #[must_use]
    pub fn module_names(&self) -> Vec<&str> {
        self.registration.iter().map(String::as_str).collect()
    }

    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    /// Consensus version of every module.
    #[must_use]
    pub fn version_map(&self) -> BTreeMap<String, u64> {
        self.modules
            .iter()
            .map(|(name, d)| (name.clone(), d.version()))
            .collect()
    }

    fn phase_order(&self, phase: LifecyclePhase) -> Result<Vec<String>, ConfigError> {
        self.orders
            .get(&phase)
            .cloned()
            .ok_or(ConfigError::OrderNotSet(phase))
    }

    fn expect_state(&self, call: &'static str, allowed: &[ManagerState]) -> Result<(), LifecycleError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(LifecycleError::PhaseViolation {
                call,
                state: self.state.to_string(),
            })
        }
    }

    /// Fail unless a block is open. Used by transaction delivery.
    pub fn ensure_in_block(&self, call: &'static str) -> Result<(), LifecycleError> {
        self.expect_state(call, &[ManagerState::InBlock])
    }

    // =========================================================================
    // GENESIS
    // =========================================================================

    /// Default genesis payload of every `GENESIS` module.
    #[must_use]
    pub fn default_genesis(&self) -> GenesisState {
        self.modules
            .iter()
            .filter_map(|(name, d)| d.genesis.as_ref().map(|g| (name.clone(), g.default_genesis())))
            .collect()
    }

    /// Check a genesis document without touching state.
    pub fn validate_genesis(&self, raw: &GenesisState) -> Result<(), GenesisError> {
        for name in raw.keys() {
            let declares = self
                .modules
                .get(name)
                .is_some_and(|d| d.capabilities().contains(Capabilities::GENESIS));
            if !declares {
                return Err(GenesisError::UnexpectedModuleState(name.clone()));
            }
        }
        let order = self
            .phase_order(LifecyclePhase::Genesis)
            .map_err(|e| GenesisError::Lifecycle(e.to_string()))?;
        for name in &order {
            let payload = raw
                .get(name)
                .ok_or_else(|| GenesisError::MissingModuleState(name.clone()))?;
            if let Some(handler) = self.modules[name].genesis.as_ref() {
                handler
                    .validate_genesis(payload)
                    .map_err(|e| GenesisError::InvalidModuleState {
                        module: name.clone(),
                        reason: e.to_string(),
                    })?;
            }
        }
        Ok(())
    }

    /// Initialize every module from `raw`, atomically.
    ///
    /// Returns the validator updates of all modules concatenated in genesis
    /// order.
    #[instrument(skip_all)]
    pub fn run_genesis(
        &mut self,
        ctx: &mut Context,
        raw: &GenesisState,
    ) -> Result<Vec<ValidatorUpdate>, GenesisError> {
        self.expect_state("run_genesis", &[ManagerState::Constructed])
            .map_err(|e| GenesisError::Lifecycle(e.to_string()))?;
        self.validate_genesis(raw)?;

        let order = self
            .phase_order(LifecyclePhase::Genesis)
            .map_err(|e| GenesisError::Lifecycle(e.to_string()))?;
        let modules = &self.modules;

        let updates = ctx.branch_scope(|ctx| {
            let mut updates = Vec::new();
            for name in &order {
                let Some(handler) = modules[name].genesis.as_ref() else {
                    continue;
                };
                let payload = &raw[name];
                debug!("[Manager] init-genesis {}", name);
                let module_updates =
                    handler
                        .init_genesis(ctx, payload)
                        .map_err(|e| GenesisError::ModuleFailed {
                            module: name.clone(),
                            reason: e.to_string(),
                        })?;
                updates.extend(module_updates);
            }
            Ok::<_, GenesisError>(updates)
        });

        match updates {
            Ok(updates) => {
                self.state = ManagerState::GenesisRun;
                info!(
                    "[Manager] Genesis complete: {} module(s), {} validator update(s)",
                    order.len(),
                    updates.len()
                );
                Ok(updates)
            }
            Err(e) => {
                error!("[Manager] Genesis failed, all genesis writes discarded: {}", e);
                Err(e)
            }
        }
    }

    /// Export every `GENESIS` module's state. Not allowed inside a block.
    pub fn export_genesis(&self, ctx: &mut Context) -> Result<GenesisState, LifecycleError> {
        self.expect_state(
            "export_genesis",
            &[ManagerState::GenesisRun, ManagerState::BlockEnded],
        )?;
        let order = self.phase_order(LifecyclePhase::Genesis).map_err(|e| {
            LifecycleError::PhaseViolation {
                call: "export_genesis",
                state: e.to_string(),
            }
        })?;
        let mut out = GenesisState::new();
        for name in order {
            if let Some(handler) = self.modules[&name].genesis.as_ref() {
                let state = handler
                    .export_genesis(ctx)
                    .map_err(|e| LifecycleError::ModuleFailed {
                        module: name.clone(),
                        phase: LifecyclePhase::Genesis,
                        reason: e.to_string(),
                    })?;
                out.insert(name, state);
            }
        }
        Ok(out)
    }

    // =========================================================================
    // BLOCKS
    // =========================================================================

    /// Run begin-block callbacks strictly in begin-block order.
    pub fn run_begin_block(
        &mut self,
        ctx: &mut Context,
        req: &BeginBlockRequest,
    ) -> Result<Vec<ModuleEvent>, LifecycleError> {
        self.expect_state(
            "run_begin_block",
            &[ManagerState::GenesisRun, ManagerState::BlockEnded],
        )?;
        let order = self.lifecycle_order(LifecyclePhase::BeginBlock)?;

        let mut events = Vec::new();
        for name in &order {
            let Some(handler) = self.modules[name].begin_block.clone() else {
                continue;
            };
            let mark = ctx.events().len();
            if let Err(e) = handler.begin_block(ctx, req) {
                return Err(self.halt(name, LifecyclePhase::BeginBlock, e.to_string()));
            }
            events.extend(tag_events(name, ctx, mark));
        }

        self.state = ManagerState::InBlock;
        debug!(
            "[Manager] begin-block {} done ({} event(s))",
            req.header.height,
            events.len()
        );
        Ok(events)
    }

    /// Run end-block callbacks strictly in end-block order.
    pub fn run_end_block(
        &mut self,
        ctx: &mut Context,
        req: &EndBlockRequest,
    ) -> Result<EndBlockOutcome, LifecycleError> {
        self.expect_state("run_end_block", &[ManagerState::InBlock])?;
        let order = self.lifecycle_order(LifecyclePhase::EndBlock)?;

        let mut outcome = EndBlockOutcome::default();
        for name in &order {
            let Some(handler) = self.modules[name].end_block.clone() else {
                continue;
            };
            let mark = ctx.events().len();
            match handler.end_block(ctx, req) {
                Ok(updates) => outcome.validator_updates.extend(updates),
                Err(e) => return Err(self.halt(name, LifecyclePhase::EndBlock, e.to_string())),
            }
            outcome.events.extend(tag_events(name, ctx, mark));
        }

        self.state = ManagerState::BlockEnded;
        debug!(
            "[Manager] end-block {} done ({} validator update(s))",
            req.height,
            outcome.validator_updates.len()
        );
        Ok(outcome)
    }

    fn lifecycle_order(&self, phase: LifecyclePhase) -> Result<Vec<String>, LifecycleError> {
        self.phase_order(phase)
            .map_err(|e| LifecycleError::PhaseViolation {
                call: "lifecycle",
                state: e.to_string(),
            })
    }

    fn halt(&mut self, module: &str, phase: LifecyclePhase, reason: String) -> LifecycleError {
        error!("[Manager] {} of '{}' failed, halting: {}", phase, module, reason);
        self.state = ManagerState::Halted;
        LifecycleError::ModuleFailed {
            module: module.to_string(),
            phase,
            reason,
        }
    }

    /// Mark the manager halted after a fatal error raised outside a callback
    /// (e.g. a broken invariant).
    pub fn halt_on(&mut self, err: &LifecycleError) {
        error!("[Manager] Halting: {}", err);
        self.state = ManagerState::Halted;
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Let every `INVARIANTS` module register its routes, in registration order.
    pub fn register_invariants(&self, registry: &mut InvariantRegistry) -> Result<(), ConfigError> {
        for name in &self.registration {
            if let Some(handler) = self.modules[name].invariants.as_ref() {
                handler.register_invariants(registry)?;
            }
        }
        debug!("[Manager] {} invariant route(s) registered", registry.len());
        Ok(())
    }

    /// Let every `SERVICES` module register its handlers, in registration order.
    pub fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        for name in &self.registration {
            if let Some(handler) = self.modules[name].services.as_ref() {
                handler.register_services(cfg)?;
            }
        }
        Ok(())
    }
}

fn tag_events(module: &str, ctx: &Context, mark: usize) -> Vec<ModuleEvent> {
    ctx.events()[mark..]
        .iter()
        .map(|event| ModuleEvent {
            module: module.to_string(),
            event: event.clone(),
        })
        .collect()
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules", &self.registration)
            .field("orders", &self.orders)
            .field("state", &self.state)
            .finish()
    }
}
