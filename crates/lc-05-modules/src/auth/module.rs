use std::collections::BTreeSet;
use std::sync::Arc;

use lc_01_state_store::Context;
use lc_03_module_manager::{Configurator, GenesisHandler, ModuleDescriptor, QueryHandler, ServiceRegistrar};
use serde::{Deserialize, Serialize};
use shared_types::{AuthParams, BaseAccount, ConfigError, ModuleError, TxError, ValidatorUpdate};
use tracing::info;

use super::{AuthKeeper, CONSENSUS_VERSION, MODULE_NAME};
use crate::{decode_query, decode_state, default_state, encode_response, encode_state, unknown_query, AddressQuery};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGenesis {
    #[serde(default)]
    pub params: AuthParams,
    #[serde(default)]
    pub accounts: Vec<BaseAccount>,
}

pub struct AuthModule {
    keeper: Arc<AuthKeeper>,
}

pub fn descriptor(keeper: Arc<AuthKeeper>) -> ModuleDescriptor {
    let module = Arc::new(AuthModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .with_genesis(module.clone())
        .with_services(module)
}

impl GenesisHandler for AuthModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<AuthGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: AuthGenesis = decode_state(state)?;
        let p = &genesis.params;
        if p.max_memo_characters == 0 || p.tx_sig_limit == 0 {
            return Err(ModuleError::Invalid(
                "max_memo_characters and tx_sig_limit must be positive".into(),
            ));
        }
        if p.tx_size_cost_per_byte == 0 || p.sig_verify_cost_ed25519 == 0 {
            return Err(ModuleError::Invalid("gas costs must be positive".into()));
        }
        let mut addresses = BTreeSet::new();
        let mut numbers = BTreeSet::new();
        for acc in &genesis.accounts {
            if !addresses.insert(acc.address) {
                return Err(ModuleError::Invalid(format!("duplicate account {}", acc.address)));
            }
            if acc.account_number == u64::MAX {
                return Err(ModuleError::Invalid(format!(
                    "account number of {} leaves no next number",
                    acc.address
                )));
            }
            if !numbers.insert(acc.account_number) {
                return Err(ModuleError::Invalid(format!(
                    "duplicate account number {}",
                    acc.account_number
                )));
            }
        }
        Ok(())
    }

    fn init_genesis(
        &self,
        ctx: &mut Context,
        state: &serde_json::Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: AuthGenesis = decode_state(state)?;
        self.keeper.set_params(ctx, &genesis.params)?;
        for acc in &genesis.accounts {
            self.keeper.set_account(ctx, acc)?;
        }
        let next = match genesis.accounts.iter().map(|a| a.account_number).max() {
            Some(max) => max
                .checked_add(1)
                .ok_or_else(|| ModuleError::Invalid("account numbers exhausted".into()))?,
            None => 0,
        };
        self.keeper.set_next_account_number(ctx, next)?;

        let names: Vec<String> = self
            .keeper
            .permissions()
            .module_addresses()
            .keys()
            .cloned()
            .collect();
        for name in &names {
            self.keeper.get_module_account(ctx, name)?;
        }
        info!(
            "[Auth] Genesis loaded {} account(s) and {} module account(s)",
            genesis.accounts.len(),
            names.len()
        );
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&AuthGenesis {
            params: self.keeper.get_params(ctx)?,
            accounts: self.keeper.accounts(ctx)?,
        })
    }
}

impl ServiceRegistrar for AuthModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        cfg.register_query(MODULE_NAME, Arc::new(Queries(Arc::clone(&self.keeper))))
    }
}

struct Queries(Arc<AuthKeeper>);

impl QueryHandler for Queries {
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "account" => {
                let req: AddressQuery = decode_query(data)?;
                encode_response(&self.0.get_account(ctx, &req.address)?)
            }
            "accounts" => encode_response(&self.0.accounts(ctx)?),
            "params" => encode_response(&self.0.get_params(ctx)?),
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
