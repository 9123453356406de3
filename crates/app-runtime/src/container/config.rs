//! # Application Configuration
//!
//! Everything `App::build` needs, passed explicitly. The defaults reproduce
//! the standard composition: the module account permissions, the empty
//! receive allow-list and the three lifecycle orders.
//!
//! ## Environment Overrides
//!
//! | Variable | Field |
//! |---|---|
//! | `LC_CHAIN_ID` | `chain_id` |
//! | `LC_INV_CHECK_PERIOD` | `inv_check_period` |
//! | `LC_SKIP_GENESIS_INVARIANTS` | `skip_genesis_invariants` |
//! | `LC_MIN_GAS_PRICES` | `min_gas_prices` (e.g. `1stake`) |
//! | `LC_GENESIS_FILE` | `genesis_file` |
//! | `LC_BLOCK_TIME_MS` | `driver.block_time_ms` |
//! | `LC_MAX_BLOCKS` | `driver.max_blocks` |

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::str::FromStr;

use lc_05_modules::{
    auth, bank, crisis, distribution, feegrant, mint, params, slashing, staking, BONDED_POOL,
    FEE_COLLECTOR, NOT_BONDED_POOL,
};
use shared_types::{Coins, ConfigError};

pub const DEFAULT_CHAIN_ID: &str = "ledger-compose-1";

/// Complete application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub chain_id: String,
    /// Module account name → permission tags.
    pub module_account_permissions: Vec<(String, Vec<String>)>,
    /// Module accounts allowed to receive funds from users.
    pub allowed_receiving_accounts: BTreeSet<String>,
    pub orders: OrderConfig,
    /// Crisis asserts every invariant each `inv_check_period` blocks. Zero
    /// disables the periodic check.
    pub inv_check_period: u64,
    /// Skip the invariant assertion after genesis.
    pub skip_genesis_invariants: bool,
    /// Minimum gas prices enforced in CheckTx.
    pub min_gas_prices: Coins,
    /// Genesis document read by the driver.
    pub genesis_file: Option<PathBuf>,
    pub driver: DriverConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            module_account_permissions: default_permissions(),
            allowed_receiving_accounts: BTreeSet::new(),
            orders: OrderConfig::default(),
            inv_check_period: 0,
            skip_genesis_invariants: false,
            min_gas_prices: Coins::empty(),
            genesis_file: None,
            driver: DriverConfig::default(),
        }
    }
}

/// Lifecycle orders by module name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    pub genesis: Vec<String>,
    pub begin_block: Vec<String>,
    pub end_block: Vec<String>,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            genesis: names(&[
                auth::MODULE_NAME,
                bank::MODULE_NAME,
                distribution::MODULE_NAME,
                staking::MODULE_NAME,
                slashing::MODULE_NAME,
                mint::MODULE_NAME,
                crisis::MODULE_NAME,
                feegrant::MODULE_NAME,
            ]),
            begin_block: names(&[
                mint::MODULE_NAME,
                distribution::MODULE_NAME,
                slashing::MODULE_NAME,
            ]),
            end_block: names(&[crisis::MODULE_NAME, staking::MODULE_NAME]),
        }
    }
}

/// Local block ticker settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub block_time_ms: u64,
    /// Stop after this many blocks. `None` runs until interrupted.
    pub max_blocks: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            block_time_ms: 1_000,
            max_blocks: None,
        }
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_permissions() -> Vec<(String, Vec<String>)> {
    vec![
        (FEE_COLLECTOR.into(), vec![]),
        (distribution::MODULE_NAME.into(), vec![]),
        (mint::MODULE_NAME.into(), vec!["minter".into()]),
        (BONDED_POOL.into(), vec!["burner".into(), "staking".into()]),
        (NOT_BONDED_POOL.into(), vec!["burner".into(), "staking".into()]),
    ]
}

impl AppConfig {
    /// Defaults overridden by `LC_*` environment variables. Unparsable
    /// values are configuration errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(chain_id) = lookup("LC_CHAIN_ID") {
            config.chain_id = chain_id;
        }
        if let Some(v) = lookup("LC_INV_CHECK_PERIOD") {
            config.inv_check_period = parse_var("LC_INV_CHECK_PERIOD", &v)?;
        }
        if let Some(v) = lookup("LC_SKIP_GENESIS_INVARIANTS") {
            config.skip_genesis_invariants = parse_var("LC_SKIP_GENESIS_INVARIANTS", &v)?;
        }
        if let Some(v) = lookup("LC_MIN_GAS_PRICES") {
            config.min_gas_prices = Coins::parse(&v)
                .map_err(|e| ConfigError::Invalid(format!("LC_MIN_GAS_PRICES: {e}")))?;
        }
        if let Some(v) = lookup("LC_GENESIS_FILE") {
            config.genesis_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("LC_BLOCK_TIME_MS") {
            config.driver.block_time_ms = parse_var("LC_BLOCK_TIME_MS", &v)?;
        }
        if let Some(v) = lookup("LC_MAX_BLOCKS") {
            config.driver.max_blocks = Some(parse_var("LC_MAX_BLOCKS", &v)?);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that do not need the module set. Orders and permissions are
    /// checked by `App::build` against the registered modules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id.trim().is_empty() {
            return Err(ConfigError::Invalid("chain id must not be empty".into()));
        }
        if self.driver.block_time_ms == 0 {
            return Err(ConfigError::Invalid("block time must be positive".into()));
        }
        let mut seen = BTreeSet::new();
        for (name, _) in &self.module_account_permissions {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateModuleAccount(name.clone()));
            }
        }
        Ok(())
    }

    /// Every persistent store the application mounts.
    #[must_use]
    pub fn kv_store_names() -> [&'static str; 8] {
        [
            auth::STORE_KEY,
            bank::STORE_KEY,
            staking::STORE_KEY,
            mint::STORE_KEY,
            distribution::STORE_KEY,
            slashing::STORE_KEY,
            params::STORE_KEY,
            feegrant::STORE_KEY,
        ]
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Invalid(format!("{name}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_orders_match_capabilities() {
        let orders = OrderConfig::default();
        assert_eq!(orders.genesis.len(), 8);
        assert_eq!(orders.begin_block, vec!["mint", "distribution", "slashing"]);
        assert_eq!(orders.end_block, vec!["crisis", "staking"]);
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LC_CHAIN_ID", "env-chain"),
            ("LC_INV_CHECK_PERIOD", "10"),
            ("LC_SKIP_GENESIS_INVARIANTS", "true"),
            ("LC_MIN_GAS_PRICES", "2stake"),
            ("LC_MAX_BLOCKS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.chain_id, "env-chain");
        assert_eq!(config.inv_check_period, 10);
        assert!(config.skip_genesis_invariants);
        assert_eq!(config.min_gas_prices.amount_of("stake"), 2);
        assert_eq!(config.driver.max_blocks, Some(3));
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let err = AppConfig::from_lookup(lookup(&[("LC_INV_CHECK_PERIOD", "often")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = AppConfig::from_lookup(lookup(&[("LC_CHAIN_ID", " ")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_duplicate_module_account_rejected() {
        let mut config = AppConfig::default();
        config
            .module_account_permissions
            .push((FEE_COLLECTOR.into(), vec![]));
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateModuleAccount(FEE_COLLECTOR.into()))
        );
    }
}
