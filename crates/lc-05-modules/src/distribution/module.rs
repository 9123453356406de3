use std::collections::BTreeSet;
use std::sync::Arc;

use lc_01_state_store::Context;
use lc_03_module_manager::{
    BeginBlockRequest, BeginBlocker, Configurator, GenesisHandler, InvariantRegistrar,
    InvariantRegistry, ModuleDescriptor, MsgHandler, QueryHandler, ServiceRegistrar,
};
use shared_types::{Coins, ConfigError, ModuleError, Msg, TxError, TxErrorKind, ValidatorUpdate};

use super::{
    DistrGenesis, DistrKeeper, MsgFundCommunityPool, MsgWithdrawValidatorRewards,
    CONSENSUS_VERSION, MODULE_NAME, MSG_FUND_COMMUNITY_POOL, MSG_WITHDRAW_REWARDS,
};
use crate::{
    decode_query, decode_state, default_state, encode_response, encode_state, ensure_signer,
    unknown_query, AddressQuery, BPS,
};

pub struct DistrModule {
    keeper: Arc<DistrKeeper>,
}

pub fn descriptor(keeper: Arc<DistrKeeper>) -> ModuleDescriptor {
    let module = Arc::new(DistrModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::bank::MODULE_NAME)
        .depends_on(crate::staking::MODULE_NAME)
        .with_genesis(module.clone())
        .with_begin_block(module.clone())
        .with_invariants(module.clone())
        .with_services(module)
}

impl GenesisHandler for DistrModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<DistrGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: DistrGenesis = decode_state(state)?;
        if u128::from(genesis.params.community_tax_bps) > BPS {
            return Err(ModuleError::Invalid(
                "community tax must be at most 10000 bps".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for r in &genesis.outstanding_rewards {
            if !seen.insert(r.validator) {
                return Err(ModuleError::Invalid(format!(
                    "duplicate rewards for validator {}",
                    r.validator
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
        let genesis: DistrGenesis = decode_state(state)?;
        self.keeper.set_params(ctx, &genesis.params)?;
        self.keeper.set_community_pool(ctx, &genesis.community_pool)?;
        for r in &genesis.outstanding_rewards {
            self.keeper.set_rewards(ctx, &r.validator, &r.rewards)?;
        }
        for e in &genesis.slash_events {
            self.keeper.record_slash(ctx, e)?;
        }
        self.keeper
            .can_withdraw_invariant(ctx)
            .map_err(|e| ModuleError::Invalid(format!("distribution module balance does not match the module holdings: {e}")))?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&DistrGenesis {
            params: self.keeper.get_params(ctx)?,
            community_pool: self.keeper.community_pool(ctx)?,
            outstanding_rewards: self.keeper.all_rewards(ctx)?,
            slash_events: self.keeper.slash_events(ctx)?,
        })
    }
}

impl BeginBlocker for DistrModule {
    fn begin_block(&self, ctx: &mut Context, req: &BeginBlockRequest) -> Result<(), ModuleError> {
        // the first block has no previous commit to reward
        if req.header.height > 1 {
            self.keeper.allocate_tokens(ctx, &req.last_commit_info)?;
        }
        Ok(())
    }
}

impl InvariantRegistrar for DistrModule {
    fn register_invariants(&self, registry: &mut InvariantRegistry) -> Result<(), ConfigError> {
        let keeper = Arc::clone(&self.keeper);
        registry.register_route(MODULE_NAME, "can-withdraw", move |ctx| {
            keeper.can_withdraw_invariant(ctx)
        })
    }
}

impl ServiceRegistrar for DistrModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        let handler = Arc::new(Handler(Arc::clone(&self.keeper)));
        cfg.register_msg(MODULE_NAME, MSG_WITHDRAW_REWARDS, handler.clone())?;
        cfg.register_msg(MODULE_NAME, MSG_FUND_COMMUNITY_POOL, handler.clone())?;
        cfg.register_query(MODULE_NAME, handler)
    }
}

struct Handler(Arc<DistrKeeper>);

impl MsgHandler for Handler {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        match msg.type_url.as_str() {
            MSG_WITHDRAW_REWARDS => {
                let m: MsgWithdrawValidatorRewards = msg.decode()?;
                ensure_signer(msg, &m.validator)?;
                self.0.withdraw_rewards(ctx, &m.validator).map(|_| ())
            }
            MSG_FUND_COMMUNITY_POOL => {
                let m: MsgFundCommunityPool = msg.decode()?;
                ensure_signer(msg, &m.depositor)?;
                self.0.fund_community_pool(ctx, &m.depositor, &m.amount)
            }
            other => Err(TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unrecognized distribution message type: {other}"),
            )),
        }
    }
}

impl QueryHandler for Handler {
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "rewards" => {
                let req: AddressQuery = decode_query(data)?;
                let rewards: Coins = self.0.rewards(ctx, &req.address)?.unwrap_or_default();
                encode_response(&rewards)
            }
            "community_pool" => encode_response(&self.0.community_pool(ctx)?),
            "params" => encode_response(&self.0.get_params(ctx)?),
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
