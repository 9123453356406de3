use std::collections::BTreeSet;
use std::sync::Arc;

use lc_01_state_store::Context;
use lc_03_module_manager::{
    BeginBlockRequest, BeginBlocker, Configurator, GenesisHandler, ModuleDescriptor, MsgHandler,
    QueryHandler, ServiceRegistrar,
};
use shared_types::{ConfigError, ModuleError, Msg, TxError, TxErrorKind, ValidatorUpdate};

use super::{
    MsgUnjail, SlashingGenesis, SlashingKeeper, CONSENSUS_VERSION, MODULE_NAME, MSG_UNJAIL,
};
use crate::{
    decode_query, decode_state, default_state, encode_response, encode_state, ensure_signer,
    unknown_query, AddressQuery, BPS,
};

pub struct SlashingModule {
    keeper: Arc<SlashingKeeper>,
}

pub fn descriptor(keeper: Arc<SlashingKeeper>) -> ModuleDescriptor {
    let module = Arc::new(SlashingModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::staking::MODULE_NAME)
        .with_genesis(module.clone())
        .with_begin_block(module.clone())
        .with_services(module)
}

impl GenesisHandler for SlashingModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<SlashingGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: SlashingGenesis = decode_state(state)?;
        let p = &genesis.params;
        if p.signed_blocks_window == 0 {
            return Err(ModuleError::Invalid("signed blocks window must be positive".into()));
        }
        if u128::from(p.min_signed_per_window_bps) > BPS
            || u128::from(p.slash_fraction_downtime_bps) > BPS
        {
            return Err(ModuleError::Invalid(
                "slashing rates must be at most 10000 bps".into(),
            ));
        }
        let mut seen = BTreeSet::new();
        for info in &genesis.signing_infos {
            if !seen.insert(info.address) {
                return Err(ModuleError::Invalid(format!(
                    "duplicate signing info for {}",
                    info.address
                )));
            }
        }
        for missed in &genesis.missed_blocks {
            if let Some(i) = missed.indexes.iter().find(|i| **i >= p.signed_blocks_window) {
                return Err(ModuleError::Invalid(format!(
                    "missed block index {i} of {} is outside the window",
                    missed.address
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
        let genesis: SlashingGenesis = decode_state(state)?;
        self.keeper.set_params(ctx, &genesis.params)?;
        for info in &genesis.signing_infos {
            self.keeper.set_signing_info(ctx, info)?;
        }
        for missed in &genesis.missed_blocks {
            for index in &missed.indexes {
                self.keeper.set_missed(ctx, &missed.address, *index, true)?;
            }
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&SlashingGenesis {
            params: self.keeper.get_params(ctx)?,
            signing_infos: self.keeper.signing_infos(ctx)?,
            missed_blocks: self.keeper.missed_blocks(ctx)?,
        })
    }
}

impl BeginBlocker for SlashingModule {
    fn begin_block(&self, ctx: &mut Context, req: &BeginBlockRequest) -> Result<(), ModuleError> {
        for vote in &req.last_commit_info {
            self.keeper.handle_validator_signature(
                ctx,
                &vote.validator,
                vote.power,
                vote.signed_last_block,
            )?;
        }
        Ok(())
    }
}

impl ServiceRegistrar for SlashingModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        let handler = Arc::new(Handler(Arc::clone(&self.keeper)));
        cfg.register_msg(MODULE_NAME, MSG_UNJAIL, handler.clone())?;
        cfg.register_query(MODULE_NAME, handler)
    }
}

struct Handler(Arc<SlashingKeeper>);

impl MsgHandler for Handler {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        match msg.type_url.as_str() {
            MSG_UNJAIL => {
                let m: MsgUnjail = msg.decode()?;
                ensure_signer(msg, &m.validator)?;
                self.0.unjail(ctx, &m.validator)
            }
            other => Err(TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unrecognized slashing message type: {other}"),
            )),
        }
    }
}

impl QueryHandler for Handler {
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "signing_info" => {
                let req: AddressQuery = decode_query(data)?;
                encode_response(&self.0.signing_info(ctx, &req.address)?)
            }
            "signing_infos" => encode_response(&self.0.signing_infos(ctx)?),
            "params" => encode_response(&self.0.get_params(ctx)?),
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
