use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lc_01_state_store::Context;
use lc_03_module_manager::{
    Configurator, EndBlockRequest, EndBlocker, GenesisHandler, InvariantRegistrar,
    InvariantRegistry, ModuleDescriptor, MsgHandler, QueryHandler, ServiceRegistrar,
};
use shared_types::{ConfigError, ModuleError, Msg, TxError, TxErrorKind, ValidatorUpdate};
use tracing::info;

use super::{
    DelegationQuery, MsgCreateValidator, MsgDelegate, StakingGenesis, StakingKeeper,
    CONSENSUS_VERSION, MODULE_NAME, MSG_CREATE_VALIDATOR, MSG_DELEGATE,
};
use crate::{
    decode_query, decode_state, default_state, encode_response, encode_state, ensure_signer,
    unknown_query, AddressQuery,
};

pub struct StakingModule {
    keeper: Arc<StakingKeeper>,
}

pub fn descriptor(keeper: Arc<StakingKeeper>) -> ModuleDescriptor {
    let module = Arc::new(StakingModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::auth::MODULE_NAME)
        .depends_on(crate::bank::MODULE_NAME)
        .with_genesis(module.clone())
        .with_end_block(module.clone())
        .with_invariants(module.clone())
        .with_services(module)
}

impl GenesisHandler for StakingModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<StakingGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: StakingGenesis = decode_state(state)?;
        if genesis.params.bond_denom.is_empty() {
            return Err(ModuleError::Invalid("bond denom must not be empty".into()));
        }
        if genesis.params.max_validators == 0 {
            return Err(ModuleError::Invalid("max validators must be positive".into()));
        }
        let mut operators = BTreeSet::new();
        let mut cons_addrs = BTreeSet::new();
        for v in &genesis.validators {
            if !operators.insert(v.operator) || !cons_addrs.insert(v.consensus_address()) {
                return Err(ModuleError::Invalid(format!(
                    "duplicate validator {}",
                    v.operator
                )));
            }
            if v.delegator_shares == 0 && v.tokens > 0 {
                return Err(ModuleError::Invalid(format!(
                    "validator {} has tokens but no shares",
                    v.operator
                )));
            }
        }
        let mut shares: BTreeMap<_, u128> = BTreeMap::new();
        for d in &genesis.delegations {
            if !operators.contains(&d.validator) {
                return Err(ModuleError::Invalid(format!(
                    "delegation to unknown validator {}",
                    d.validator
                )));
            }
            *shares.entry(d.validator).or_default() += d.shares;
        }
        for v in &genesis.validators {
            if shares.get(&v.operator).copied().unwrap_or(0) != v.delegator_shares {
                return Err(ModuleError::Invalid(format!(
                    "delegations of validator {} do not add up to its shares",
                    v.operator
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
        let genesis: StakingGenesis = decode_state(state)?;
        self.keeper.set_params(ctx, &genesis.params)?;
        for v in &genesis.validators {
            self.keeper.set_validator(ctx, v)?;
            if !genesis.exported {
                self.keeper.notify_created(ctx, &v.operator)?;
            }
        }
        for d in &genesis.delegations {
            self.keeper.set_delegation(ctx, d)?;
        }
        // pools must already hold exactly the validators' tokens
        self.keeper
            .module_accounts_invariant(ctx)
            .map_err(|e| ModuleError::Invalid(format!("staking pools do not match genesis: {e}")))?;

        let updates = self.keeper.apply_and_return_validator_set_updates(ctx)?;
        info!(
            "[Staking] Genesis loaded {} validator(s), {} initial update(s)",
            genesis.validators.len(),
            updates.len()
        );
        Ok(updates)
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&StakingGenesis {
            params: self.keeper.get_params(ctx)?,
            validators: self.keeper.validators(ctx)?,
            delegations: self.keeper.delegations(ctx)?,
            exported: true,
        })
    }
}

impl EndBlocker for StakingModule {
    fn end_block(
        &self,
        ctx: &mut Context,
        _req: &EndBlockRequest,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        Ok(self.keeper.apply_and_return_validator_set_updates(ctx)?)
    }
}

impl InvariantRegistrar for StakingModule {
    fn register_invariants(&self, registry: &mut InvariantRegistry) -> Result<(), ConfigError> {
        let keeper = Arc::clone(&self.keeper);
        registry.register_route(MODULE_NAME, "module-accounts", move |ctx| {
            keeper.module_accounts_invariant(ctx)
        })?;
        let keeper = Arc::clone(&self.keeper);
        registry.register_route(MODULE_NAME, "delegator-shares", move |ctx| {
            keeper.delegator_shares_invariant(ctx)
        })
    }
}

impl ServiceRegistrar for StakingModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        let handler = Arc::new(Handler(Arc::clone(&self.keeper)));
        cfg.register_msg(MODULE_NAME, MSG_CREATE_VALIDATOR, handler.clone())?;
        cfg.register_msg(MODULE_NAME, MSG_DELEGATE, handler.clone())?;
        cfg.register_query(MODULE_NAME, handler)
    }
}

struct Handler(Arc<StakingKeeper>);

impl Handler {
    fn check_denom(&self, ctx: &mut Context, denom: &str) -> Result<(), TxError> {
        let bond_denom = self.0.get_params(ctx)?.bond_denom;
        if denom != bond_denom {
            return Err(TxError::new(
                TxErrorKind::InvalidCoins,
                format!("invalid coin denomination: got {denom}, expected {bond_denom}"),
            ));
        }
        Ok(())
    }
}

impl MsgHandler for Handler {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        match msg.type_url.as_str() {
            MSG_CREATE_VALIDATOR => {
                let m: MsgCreateValidator = msg.decode()?;
                ensure_signer(msg, &m.operator)?;
                self.check_denom(ctx, &m.amount.denom)?;
                self.0
                    .create_validator(ctx, &m.operator, &m.pub_key, m.amount.amount)
            }
            MSG_DELEGATE => {
                let m: MsgDelegate = msg.decode()?;
                ensure_signer(msg, &m.delegator)?;
                self.check_denom(ctx, &m.amount.denom)?;
                self.0
                    .delegate(ctx, &m.delegator, &m.validator, m.amount.amount)
                    .map(|_| ())
            }
            other => Err(TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unrecognized staking message type: {other}"),
            )),
        }
    }
}

impl QueryHandler for Handler {
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "validators" => encode_response(&self.0.validators(ctx)?),
            "validator" => {
                let req: AddressQuery = decode_query(data)?;
                encode_response(&self.0.get_validator(ctx, &req.address)?)
            }
            "delegation" => {
                let req: DelegationQuery = decode_query(data)?;
                encode_response(&self.0.get_delegation(ctx, &req.delegator, &req.validator)?)
            }
            "pool" => encode_response(&self.0.pool(ctx)?),
            "params" => encode_response(&self.0.get_params(ctx)?),
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
