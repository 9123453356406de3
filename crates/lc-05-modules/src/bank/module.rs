use std::collections::BTreeSet;
use std::sync::Arc;

use lc_01_state_store::Context;
use lc_03_module_manager::{
    Configurator, GenesisHandler, InvariantRegistrar, InvariantRegistry, ModuleDescriptor,
    MsgHandler, QueryHandler, ServiceRegistrar,
};
use shared_types::{Coins, ConfigError, ModuleError, Msg, TxError, TxErrorKind, ValidatorUpdate};
use tracing::info;

use super::{BankGenesis, BankKeeper, MsgSend, CONSENSUS_VERSION, MODULE_NAME, MSG_SEND};
use crate::{
    decode_query, decode_state, default_state, encode_response, encode_state, ensure_signer,
    unknown_query, AddressQuery,
};

pub struct BankModule {
    keeper: Arc<BankKeeper>,
}

pub fn descriptor(keeper: Arc<BankKeeper>) -> ModuleDescriptor {
    let module = Arc::new(BankModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::auth::MODULE_NAME)
        .with_genesis(module.clone())
        .with_invariants(module.clone())
        .with_services(module)
}

fn sum_balances(genesis: &BankGenesis) -> Result<Coins, ModuleError> {
    genesis
        .balances
        .iter()
        .try_fold(Coins::empty(), |acc, b| acc.checked_add(&b.coins))
        .ok_or_else(|| ModuleError::Invalid("genesis balances overflow".into()))
}

impl GenesisHandler for BankModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<BankGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: BankGenesis = decode_state(state)?;
        let mut seen = BTreeSet::new();
        for b in &genesis.balances {
            if !seen.insert(b.address) {
                return Err(ModuleError::Invalid(format!(
                    "duplicate balance for address {}",
                    b.address
                )));
            }
        }
        let sum = sum_balances(&genesis)?;
        if !genesis.supply.is_zero() && genesis.supply != sum {
            return Err(ModuleError::Invalid(format!(
                "genesis supply is incorrect, expected {}, got {}",
                genesis.supply, sum
            )));
        }
        Ok(())
    }

    fn init_genesis(
        &self,
        ctx: &mut Context,
        state: &serde_json::Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: BankGenesis = decode_state(state)?;
        self.keeper.set_params(ctx, &genesis.params)?;
        for b in &genesis.balances {
            self.keeper.set_balance(ctx, &b.address, &b.coins)?;
        }
        let supply = sum_balances(&genesis)?;
        self.keeper.set_supply(ctx, &supply)?;
        info!(
            "[Bank] Genesis loaded {} balance(s), supply {}",
            genesis.balances.len(),
            supply
        );
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&BankGenesis {
            params: self.keeper.get_params(ctx)?,
            balances: self.keeper.balances(ctx)?,
            supply: self.keeper.get_supply(ctx)?,
        })
    }
}

impl InvariantRegistrar for BankModule {
    fn register_invariants(&self, registry: &mut InvariantRegistry) -> Result<(), ConfigError> {
        let keeper = Arc::clone(&self.keeper);
        registry.register_route(MODULE_NAME, "total-supply", move |ctx| {
            keeper.total_supply_invariant(ctx)
        })
    }
}

impl ServiceRegistrar for BankModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        let handler = Arc::new(Handler(Arc::clone(&self.keeper)));
        cfg.register_msg(MODULE_NAME, MSG_SEND, handler.clone())?;
        cfg.register_query(MODULE_NAME, handler)
    }
}

struct Handler(Arc<BankKeeper>);

impl MsgHandler for Handler {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        let send: MsgSend = msg.decode()?;
        ensure_signer(msg, &send.from_address)?;
        if !self.0.get_params(ctx)?.default_send_enabled {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                "transfers are currently disabled",
            ));
        }
        if self.0.is_blocked(&send.to_address) {
            return Err(TxError::new(
                TxErrorKind::BlockedAddress,
                format!("{} is not allowed to receive funds", send.to_address),
            ));
        }
        if send.amount.is_zero() {
            return Err(TxError::new(TxErrorKind::InvalidCoins, "send amount is zero"));
        }
        self.0
            .send_coins(ctx, &send.from_address, &send.to_address, &send.amount)
    }
}

impl QueryHandler for Handler {
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "balance" => {
                let req: AddressQuery = decode_query(data)?;
                encode_response(&self.0.get_balance(ctx, &req.address)?)
            }
            "balances" => encode_response(&self.0.balances(ctx)?),
            "supply" => encode_response(&self.0.get_supply(ctx)?),
            "params" => encode_response(&self.0.get_params(ctx)?),
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
