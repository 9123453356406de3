//! # Feegrant
//!
//! Fee allowances. A granter lets a grantee pay transaction fees from the
//! granter's account, up to an optional spend limit and until an optional
//! expiration. The ante pipeline charges allowances through
//! [`FeegrantKeeper::use_granted_fees`].

use std::collections::BTreeSet;
use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey};
use lc_03_module_manager::{
    Configurator, GenesisHandler, ModuleDescriptor, MsgHandler, QueryHandler, ServiceRegistrar,
};
use lc_04_ante_pipeline::ports as ante;
use serde::{Deserialize, Serialize};
use shared_types::{
    Address, Coins, ConfigError, Event, ModuleError, Msg, StoreError, TxError, TxErrorKind,
    ValidatorUpdate,
};
use tracing::debug;

use crate::auth::AuthKeeper;
use crate::{
    decode_query, decode_state, default_state, encode_response, encode_state, ensure_signer,
    unknown_query, AddressQuery,
};

pub const MODULE_NAME: &str = "feegrant";
pub const STORE_KEY: &str = "feegrant";
pub const CONSENSUS_VERSION: u64 = 2;
pub const MSG_GRANT_ALLOWANCE: &str = "/feegrant.MsgGrantAllowance";
pub const MSG_REVOKE_ALLOWANCE: &str = "/feegrant.MsgRevokeAllowance";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAllowance {
    /// Empty means unlimited.
    #[serde(default)]
    pub spend_limit: Coins,
    /// Unix seconds.
    #[serde(default)]
    pub expiration: Option<u64>,
}

impl BasicAllowance {
    fn is_expired(&self, now: u64) -> bool {
        self.expiration.is_some_and(|t| t <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub granter: Address,
    pub grantee: Address,
    pub allowance: BasicAllowance,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeegrantGenesis {
    #[serde(default)]
    pub allowances: Vec<Grant>,
}

pub type MsgGrantAllowance = Grant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgRevokeAllowance {
    pub granter: Address,
    pub grantee: Address,
}

pub type AllowanceQuery = MsgRevokeAllowance;

fn grant_key(granter: &Address, grantee: &Address) -> Vec<u8> {
    [grantee.as_bytes().as_slice(), granter.as_bytes().as_slice()].concat()
}

fn feegrant_err(detail: impl Into<String>) -> TxError {
    TxError::new(TxErrorKind::FeeGrant, detail)
}

pub struct FeegrantKeeper {
    key: StoreKey,
    ak: Arc<AuthKeeper>,
}

impl FeegrantKeeper {
    pub fn new(key: StoreKey, ak: Arc<AuthKeeper>) -> Self {
        Self { key, ak }
    }

    pub fn get_allowance(
        &self,
        ctx: &mut Context,
        granter: &Address,
        grantee: &Address,
    ) -> Result<Option<BasicAllowance>, StoreError> {
        Ok(self.grant(ctx, granter, grantee)?.map(|g| g.allowance))
    }

    fn set_allowance(&self, ctx: &mut Context, grant: &Grant) -> Result<(), StoreError> {
        ctx.kv(&self.key)
            .set_value(&grant_key(&grant.granter, &grant.grantee), grant)
    }

    fn remove_allowance(&self, ctx: &mut Context, granter: &Address, grantee: &Address) -> Result<(), StoreError> {
        ctx.kv(&self.key).delete(&grant_key(granter, grantee))
    }

    fn grant(&self, ctx: &mut Context, granter: &Address, grantee: &Address) -> Result<Option<Grant>, StoreError> {
        ctx.kv(&self.key).get_value(&grant_key(granter, grantee))
    }

    pub fn grant_allowance(&self, ctx: &mut Context, grant: &Grant) -> Result<(), TxError> {
        if grant.granter == grant.grantee {
            return Err(TxError::new(
                TxErrorKind::InvalidAddress,
                "cannot self-grant fee authorization",
            ));
        }
        if self.grant(ctx, &grant.granter, &grant.grantee)?.is_some() {
            return Err(feegrant_err("fee allowance already exists"));
        }
        if grant.allowance.is_expired(ctx.block_time()) {
            return Err(feegrant_err("expiration is before current block time"));
        }
        self.ak.ensure_account(ctx, &grant.grantee)?;
        self.set_allowance(ctx, grant)?;
        ctx.emit_event(
            Event::new("set_feegrant")
                .attr("granter", grant.granter)
                .attr("grantee", grant.grantee),
        );
        Ok(())
    }

    pub fn revoke_allowance(&self, ctx: &mut Context, granter: &Address, grantee: &Address) -> Result<(), TxError> {
        if self.grant(ctx, granter, grantee)?.is_none() {
            return Err(feegrant_err("fee-grant not found"));
        }
        self.remove_allowance(ctx, granter, grantee)?;
        ctx.emit_event(
            Event::new("revoke_feegrant")
                .attr("granter", granter)
                .attr("grantee", grantee),
        );
        Ok(())
    }

    /// Every grant, ordered by grantee then granter.
    pub fn grants(&self, ctx: &mut Context) -> Result<Vec<Grant>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .values::<Grant>(b"")?
            .into_iter()
            .map(|(_, g)| g)
            .collect())
    }

    pub fn grants_to(&self, ctx: &mut Context, grantee: &Address) -> Result<Vec<Grant>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .values::<Grant>(grantee.as_bytes())?
            .into_iter()
            .map(|(_, g)| g)
            .collect())
    }

    /// Charge `fee` against the allowance. An expired or used-up allowance is
    /// removed.
    pub fn use_granted_fees(
        &self,
        ctx: &mut Context,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
    ) -> Result<(), TxError> {
        let mut grant = self
            .grant(ctx, granter, grantee)?
            .ok_or_else(|| feegrant_err("fee-grant not found"))?;
        if grant.allowance.is_expired(ctx.block_time()) {
            self.remove_allowance(ctx, granter, grantee)?;
            return Err(feegrant_err("fee allowance expired"));
        }
        if grant.allowance.spend_limit.is_zero() {
            debug!("[Feegrant] Unlimited allowance of {} used by {}", granter, grantee);
        } else {
            let left = grant
                .allowance
                .spend_limit
                .checked_sub(fee)
                .ok_or_else(|| feegrant_err("fee limit exceeded"))?;
            if left.is_zero() {
                self.remove_allowance(ctx, granter, grantee)?;
            } else {
                grant.allowance.spend_limit = left;
                self.set_allowance(ctx, &grant)?;
            }
        }
        ctx.emit_event(
            Event::new("use_feegrant")
                .attr("granter", granter)
                .attr("grantee", grantee),
        );
        Ok(())
    }
}

impl ante::FeegrantKeeper for FeegrantKeeper {
    fn use_granted_fees(
        &self,
        ctx: &mut Context,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        _msgs: &[Msg],
    ) -> Result<(), TxError> {
        FeegrantKeeper::use_granted_fees(self, ctx, granter, grantee, fee)
    }
}

pub struct FeegrantModule {
    keeper: Arc<FeegrantKeeper>,
}

pub fn descriptor(keeper: Arc<FeegrantKeeper>) -> ModuleDescriptor {
    let module = Arc::new(FeegrantModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::auth::MODULE_NAME)
        .with_genesis(module.clone())
        .with_services(module)
}

impl GenesisHandler for FeegrantModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<FeegrantGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: FeegrantGenesis = decode_state(state)?;
        let mut seen = BTreeSet::new();
        for g in &genesis.allowances {
            if g.granter == g.grantee {
                return Err(ModuleError::Invalid(format!("{} grants to itself", g.granter)));
            }
            if !seen.insert((g.granter, g.grantee)) {
                return Err(ModuleError::Invalid(format!(
                    "duplicate allowance from {} to {}",
                    g.granter, g.grantee
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
        let genesis: FeegrantGenesis = decode_state(state)?;
        for g in &genesis.allowances {
            self.keeper.set_allowance(ctx, g)?;
        }
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&FeegrantGenesis {
            allowances: self.keeper.grants(ctx)?,
        })
    }
}

impl ServiceRegistrar for FeegrantModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        let handler = Arc::new(Handler(Arc::clone(&self.keeper)));
        cfg.register_msg(MODULE_NAME, MSG_GRANT_ALLOWANCE, handler.clone())?;
        cfg.register_msg(MODULE_NAME, MSG_REVOKE_ALLOWANCE, handler.clone())?;
        cfg.register_query(MODULE_NAME, handler)
    }
}

struct Handler(Arc<FeegrantKeeper>);

impl MsgHandler for Handler {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        match msg.type_url.as_str() {
            MSG_GRANT_ALLOWANCE => {
                let m: MsgGrantAllowance = msg.decode()?;
                ensure_signer(msg, &m.granter)?;
                self.0.grant_allowance(ctx, &m)
            }
            MSG_REVOKE_ALLOWANCE => {
                let m: MsgRevokeAllowance = msg.decode()?;
                ensure_signer(msg, &m.granter)?;
                self.0.revoke_allowance(ctx, &m.granter, &m.grantee)
            }
            other => Err(TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unrecognized feegrant message type: {other}"),
            )),
        }
    }
}

impl QueryHandler for Handler {
    fn query(&self, ctx: &mut Context, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "allowance" => {
                let req: AllowanceQuery = decode_query(data)?;
                encode_response(&self.0.get_allowance(ctx, &req.granter, &req.grantee)?)
            }
            "allowances" => {
                let req: AddressQuery = decode_query(data)?;
                encode_response(&self.0.grants_to(ctx, &req.address)?)
            }
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
