//! # Keeper Container
//!
//! Allocates the store keys, mounts them and builds every keeper exactly
//! once, in dependency order:
//!
//! ```text
//! params → auth → bank → staking → mint → distribution → slashing → crisis → feegrant
//! ```
//!
//! Keepers are handed out as `Arc`s and never mutated afterwards except
//! through their set-once hook slots (see `wiring`).

pub mod config;

use std::collections::BTreeMap;
use std::sync::Arc;

use lc_01_state_store::{CommitMultiStore, ParamsKeeper, StoreKey, StoreKeyRegistry};
use lc_02_module_accounts::{parse_permissions, PermissionTable};
use lc_05_modules::{
    auth, bank, crisis, distribution, feegrant, mint, params, slashing, staking, AuthKeeper,
    BankKeeper, CrisisKeeper, DistrKeeper, FeegrantKeeper, MintKeeper, SlashingKeeper,
    StakingKeeper,
};
use shared_types::ConfigError;
use tracing::{info, instrument};

pub use config::*;

/// Keys handed out by the registry, by namespace.
#[derive(Debug, Clone)]
pub struct StoreKeys {
    pub kv: BTreeMap<String, StoreKey>,
    pub transient: BTreeMap<String, StoreKey>,
    pub memory: BTreeMap<String, StoreKey>,
}

impl StoreKeys {
    /// Allocate every key the module set needs.
    pub fn allocate(registry: &mut StoreKeyRegistry) -> Result<Self, ConfigError> {
        Ok(Self {
            kv: registry.allocate_kv(&AppConfig::kv_store_names())?,
            transient: registry.allocate_transient(&[params::TRANSIENT_KEY])?,
            memory: registry.allocate_memory(&[crisis::MEMORY_KEY])?,
        })
    }

    fn pick(map: &BTreeMap<String, StoreKey>, name: &str) -> Result<StoreKey, ConfigError> {
        map.get(name)
            .cloned()
            .ok_or_else(|| ConfigError::Invalid(format!("store key '{name}' was not allocated")))
    }

    pub fn kv(&self, name: &str) -> Result<StoreKey, ConfigError> {
        Self::pick(&self.kv, name)
    }

    pub fn transient(&self, name: &str) -> Result<StoreKey, ConfigError> {
        Self::pick(&self.transient, name)
    }

    pub fn memory(&self, name: &str) -> Result<StoreKey, ConfigError> {
        Self::pick(&self.memory, name)
    }
}

/// Allocate keys and mount them on a fresh commit store.
pub fn mount_stores() -> Result<(StoreKeys, CommitMultiStore), ConfigError> {
    let mut registry = StoreKeyRegistry::new();
    let keys = StoreKeys::allocate(&mut registry)?;
    let mut cms = CommitMultiStore::new();
    cms.mount_all(&registry.all_keys())?;
    info!(
        "[App] Mounted {} persistent, {} transient, {} memory store(s)",
        keys.kv.len(),
        keys.transient.len(),
        keys.memory.len()
    );
    Ok((keys, cms))
}

/// Derive the module account table from configuration.
pub fn permission_table(config: &AppConfig) -> Result<PermissionTable, ConfigError> {
    let raw = parse_permissions(
        config
            .module_account_permissions
            .iter()
            .map(|(name, perms)| (name.as_str(), perms.iter().map(String::as_str))),
    )?;
    PermissionTable::derive(raw, &config.allowed_receiving_accounts)
}

/// Every keeper of the application.
#[derive(Clone)]
pub struct Keepers {
    pub params: Arc<ParamsKeeper>,
    pub auth: Arc<AuthKeeper>,
    pub bank: Arc<BankKeeper>,
    pub staking: Arc<StakingKeeper>,
    pub mint: Arc<MintKeeper>,
    pub distr: Arc<DistrKeeper>,
    pub slashing: Arc<SlashingKeeper>,
    pub crisis: Arc<CrisisKeeper>,
    pub feegrant: Arc<FeegrantKeeper>,
}

impl Keepers {
    #[instrument(skip_all)]
    pub fn build(
        config: &AppConfig,
        keys: &StoreKeys,
        table: Arc<PermissionTable>,
    ) -> Result<Self, ConfigError> {
        let mut pk = ParamsKeeper::new(
            keys.kv(params::STORE_KEY)?,
            keys.transient(params::TRANSIENT_KEY)?,
        );

        let auth = Arc::new(AuthKeeper::new(
            keys.kv(auth::STORE_KEY)?,
            pk.subspace(auth::MODULE_NAME)?,
            table,
        ));
        let bank = Arc::new(BankKeeper::new(
            keys.kv(bank::STORE_KEY)?,
            Arc::clone(&auth),
            pk.subspace(bank::MODULE_NAME)?,
        ));
        let staking = Arc::new(StakingKeeper::new(
            keys.kv(staking::STORE_KEY)?,
            Arc::clone(&bank),
            pk.subspace(staking::MODULE_NAME)?,
        ));
        let mint = Arc::new(MintKeeper::new(
            keys.kv(mint::STORE_KEY)?,
            Arc::clone(&staking),
            Arc::clone(&bank),
            pk.subspace(mint::MODULE_NAME)?,
        ));
        let distr = Arc::new(DistrKeeper::new(
            keys.kv(distribution::STORE_KEY)?,
            Arc::clone(&bank),
            Arc::clone(&staking),
            pk.subspace(distribution::MODULE_NAME)?,
        ));
        let slashing = Arc::new(SlashingKeeper::new(
            keys.kv(slashing::STORE_KEY)?,
            Arc::clone(&staking),
            pk.subspace(slashing::MODULE_NAME)?,
        ));
        let crisis = Arc::new(CrisisKeeper::new(
            keys.memory(crisis::MEMORY_KEY)?,
            Arc::clone(&bank),
            pk.subspace(crisis::MODULE_NAME)?,
            config.inv_check_period,
        ));
        let feegrant = Arc::new(FeegrantKeeper::new(
            keys.kv(feegrant::STORE_KEY)?,
            Arc::clone(&auth),
        ));

        info!("[App] Built 9 keepers");
        Ok(Self {
            params: Arc::new(pk),
            auth,
            bank,
            staking,
            mint,
            distr,
            slashing,
            crisis,
            feegrant,
        })
    }
}
