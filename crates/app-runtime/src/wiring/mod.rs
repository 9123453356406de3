//! # Wiring
//!
//! The passes that run after every keeper exists:
//!
//! 1. **Hooks**: staking notifies distribution and slashing
//! 2. **Module set**: descriptors in registration order plus the three
//!    lifecycle orders
//! 3. **Invariants**: routes gathered from the module set are installed in
//!    crisis
//! 4. **Services**: message and query routers
//! 5. **Ante**: the standard admission chain over the auth, bank and
//!    feegrant ports
//!
//! Each pass only takes shared handles; nothing built earlier is rebuilt.

use std::sync::Arc;

use lc_03_module_manager::{
    Configurator, InvariantRegistry, ModuleDescriptor, ModuleManager, MsgServiceRouter,
    QueryRouter,
};
use lc_04_ante_pipeline::{new_ante_handler, AnteHandler, HandlerOptions};
use lc_05_modules::distribution::DistrHooks;
use lc_05_modules::slashing::SlashingHooks;
use lc_05_modules::{
    auth, bank, crisis, distribution, feegrant, mint, params, slashing, staking,
    MultiStakingHooks, StakingHooks, FEE_COLLECTOR,
};
use shared_types::{ConfigError, LifecyclePhase};
use tracing::{debug, info};

use crate::container::{Keepers, OrderConfig};

/// Install the staking hooks. Distribution runs before slashing.
pub fn wire_hooks(keepers: &Keepers) -> Result<(), ConfigError> {
    let hooks: Vec<Arc<dyn StakingHooks>> = vec![
        Arc::new(DistrHooks(Arc::clone(&keepers.distr))),
        Arc::new(SlashingHooks(Arc::clone(&keepers.slashing))),
    ];
    keepers
        .staking
        .set_hooks(Arc::new(MultiStakingHooks::new(hooks)))
}

/// Descriptors in registration order. A module only depends on modules
/// listed before it.
pub fn descriptors(keepers: &Keepers) -> Vec<ModuleDescriptor> {
    vec![
        auth::descriptor(Arc::clone(&keepers.auth)),
        bank::descriptor(Arc::clone(&keepers.bank)),
        staking::descriptor(Arc::clone(&keepers.staking)),
        mint::descriptor(Arc::clone(&keepers.mint)),
        distribution::descriptor(Arc::clone(&keepers.distr)),
        slashing::descriptor(Arc::clone(&keepers.slashing)),
        crisis::descriptor(Arc::clone(&keepers.crisis)),
        feegrant::descriptor(Arc::clone(&keepers.feegrant)),
        params::descriptor(Arc::clone(&keepers.params)),
    ]
}

/// Register the module set and its three orders.
pub fn build_manager(
    descriptors: Vec<ModuleDescriptor>,
    orders: &OrderConfig,
) -> Result<ModuleManager, ConfigError> {
    let mut manager = ModuleManager::new(descriptors)?;
    for (phase, names) in [
        (LifecyclePhase::Genesis, &orders.genesis),
        (LifecyclePhase::BeginBlock, &orders.begin_block),
        (LifecyclePhase::EndBlock, &orders.end_block),
    ] {
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        manager.set_order(phase, &names)?;
        debug!("[App] {} order: {:?}", phase, names);
    }
    manager.assert_orders_complete()?;
    Ok(manager)
}

/// Collect every module's invariant routes and hand them to crisis.
pub fn wire_invariants(
    manager: &ModuleManager,
    keepers: &Keepers,
) -> Result<Arc<InvariantRegistry>, ConfigError> {
    let mut registry = InvariantRegistry::new();
    manager.register_invariants(&mut registry)?;
    let registry = Arc::new(registry);
    keepers.crisis.set_invariants(Arc::clone(&registry))?;
    Ok(registry)
}

pub fn build_routers(manager: &ModuleManager) -> Result<(MsgServiceRouter, QueryRouter), ConfigError> {
    let mut cfg = Configurator::new();
    manager.register_services(&mut cfg)?;
    let (msgs, queries) = cfg.into_routers();
    info!("[App] Registered {} message route(s)", msgs.type_urls().len());
    Ok((msgs, queries))
}

pub fn build_ante(keepers: &Keepers) -> Result<AnteHandler, ConfigError> {
    new_ante_handler(HandlerOptions {
        account_keeper: Some(keepers.auth.clone()),
        bank_keeper: Some(keepers.bank.clone()),
        feegrant_keeper: Some(keepers.feegrant.clone()),
        fee_collector: Some(FEE_COLLECTOR.to_string()),
    })
}
