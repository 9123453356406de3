//! # Crisis
//!
//! Runs the invariant routes every module registered. Any account may pay a
//! constant fee to check one route on demand; a broken route is recorded in
//! the in-memory partition and halts the chain at the next end-block. Every
//! `inv_check_period` blocks all routes are asserted in end-block.

use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use lc_03_module_manager::{
    Configurator, EndBlockRequest, EndBlocker, GenesisHandler, InvariantBreak, InvariantRegistry,
    ModuleDescriptor, MsgHandler, QueryHandler, ServiceRegistrar,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use shared_types::{
    Address, Coin, Coins, ConfigError, Event, ModuleError, Msg, StoreError, TxError, TxErrorKind,
    ValidatorUpdate,
};
use tracing::{error, info};

use crate::bank::BankKeeper;
use crate::{
    decode_state, default_state, encode_response, encode_state, ensure_signer, unknown_query,
    FEE_COLLECTOR,
};

pub const MODULE_NAME: &str = "crisis";
/// Name of the in-memory partition.
pub const MEMORY_KEY: &str = "crisis";
pub const CONSENSUS_VERSION: u64 = 1;
pub const MSG_VERIFY_INVARIANT: &str = "/crisis.MsgVerifyInvariant";

const CONSTANT_FEE: &str = "constant_fee";
const HALT: &[u8] = b"halt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrisisGenesis {
    pub constant_fee: Coin,
}

impl Default for CrisisGenesis {
    fn default() -> Self {
        Self {
            constant_fee: Coin::new("stake", 1_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgVerifyInvariant {
    pub sender: Address,
    pub invariant_module_name: String,
    pub invariant_route: String,
}

/// A broken route recorded for the halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RecordedBreak {
    route: String,
    detail: String,
}

pub struct CrisisKeeper {
    mem_key: StoreKey,
    bank: Arc<BankKeeper>,
    subspace: Subspace,
    inv_check_period: u64,
    invariants: RwLock<Option<Arc<InvariantRegistry>>>,
}

impl CrisisKeeper {
    pub fn new(mem_key: StoreKey, bank: Arc<BankKeeper>, subspace: Subspace, inv_check_period: u64) -> Self {
        Self {
            mem_key,
            bank,
            subspace,
            inv_check_period,
            invariants: RwLock::new(None),
        }
    }

    /// Install the routes gathered from every module. Set once.
    pub fn set_invariants(&self, registry: Arc<InvariantRegistry>) -> Result<(), ConfigError> {
        let mut slot = self.invariants.write();
        if slot.is_some() {
            return Err(ConfigError::HooksAlreadySet(MODULE_NAME.into()));
        }
        info!("[Crisis] Registered {} invariant route(s)", registry.len());
        *slot = Some(registry);
        Ok(())
    }

    #[must_use]
    pub fn inv_check_period(&self) -> u64 {
        self.inv_check_period
    }

    pub fn constant_fee(&self, ctx: &mut Context) -> Result<Coin, StoreError> {
        Ok(self
            .subspace
            .get(ctx, CONSTANT_FEE)?
            .unwrap_or_else(|| CrisisGenesis::default().constant_fee))
    }

    pub fn set_constant_fee(&self, ctx: &mut Context, fee: &Coin) -> Result<(), StoreError> {
        self.subspace.set(ctx, CONSTANT_FEE, fee)
    }

    /// Assert every registered route; the first broken one is returned.
    pub fn assert_invariants(&self, ctx: &mut Context) -> Result<(), InvariantBreak> {
        match self.invariants.read().clone() {
            Some(registry) => registry.assert_all(ctx),
            None => Ok(()),
        }
    }

    /// Charge the constant fee and check one route. A broken route is
    /// recorded and halts the chain at end-block.
    pub fn verify_invariant(&self, ctx: &mut Context, sender: &Address, route: &str) -> Result<(), TxError> {
        let registry = self.invariants.read().clone().ok_or_else(|| {
            TxError::new(TxErrorKind::InvalidRequest, "no invariants registered")
        })?;
        if !registry.routes().iter().any(|r| r.full_route() == route) {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                format!("unknown invariant route {route}"),
            ));
        }
        let fee = self.constant_fee(ctx)?;
        self.bank.send_coins_from_account_to_module(
            ctx,
            sender,
            FEE_COLLECTOR,
            &Coins::from_unsorted([fee]),
        )?;
        if let Some(Err(detail)) = registry.check_route(ctx, route) {
            error!("[Crisis] Invariant {} broken on request of {}: {}", route, sender, detail);
            let record = RecordedBreak {
                route: route.to_string(),
                detail,
            };
            ctx.kv(&self.mem_key).set_value(HALT, &record)?;
        }
        ctx.emit_event(
            Event::new("invariant")
                .attr("route", route)
                .attr("sender", sender),
        );
        Ok(())
    }

    pub fn recorded_break(&self, ctx: &mut Context) -> Result<Option<InvariantBreak>, StoreError> {
        Ok(ctx
            .kv(&self.mem_key)
            .get_value::<RecordedBreak>(HALT)?
            .map(|r| InvariantBreak {
                route: r.route,
                detail: r.detail,
            }))
    }
}

pub struct CrisisModule {
    keeper: Arc<CrisisKeeper>,
}

pub fn descriptor(keeper: Arc<CrisisKeeper>) -> ModuleDescriptor {
    let module = Arc::new(CrisisModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::bank::MODULE_NAME)
        .with_genesis(module.clone())
        .with_end_block(module.clone())
        .with_services(module)
}

impl GenesisHandler for CrisisModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<CrisisGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: CrisisGenesis = decode_state(state)?;
        if genesis.constant_fee.denom.is_empty() || genesis.constant_fee.amount == 0 {
            return Err(ModuleError::Invalid(format!(
                "constant fee must be positive: {}",
                genesis.constant_fee
            )));
        }
        Ok(())
    }

    fn init_genesis(
        &self,
        ctx: &mut Context,
        state: &serde_json::Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: CrisisGenesis = decode_state(state)?;
        self.keeper.set_constant_fee(ctx, &genesis.constant_fee)?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&CrisisGenesis {
            constant_fee: self.keeper.constant_fee(ctx)?,
        })
    }
}

impl EndBlocker for CrisisModule {
    fn end_block(
        &self,
        ctx: &mut Context,
        req: &EndBlockRequest,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        if let Some(b) = self.keeper.recorded_break(ctx)? {
            return Err(ModuleError::Invalid(format!(
                "invariant {} broken: {}",
                b.route, b.detail
            )));
        }
        let period = self.keeper.inv_check_period();
        if period > 0 && req.height % period == 0 {
            self.keeper
                .assert_invariants(ctx)
                .map_err(|b| ModuleError::Invalid(format!("invariant {} broken: {}", b.route, b.detail)))?;
        }
        Ok(Vec::new())
    }
}

impl ServiceRegistrar for CrisisModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        let handler = Arc::new(Handler(Arc::clone(&self.keeper)));
        cfg.register_msg(MODULE_NAME, MSG_VERIFY_INVARIANT, handler.clone())?;
        cfg.register_query(MODULE_NAME, handler)
    }
}

struct Handler(Arc<CrisisKeeper>);

impl MsgHandler for Handler {
    fn handle(&self, ctx: &mut Context, msg: &Msg) -> Result<(), TxError> {
        match msg.type_url.as_str() {
            MSG_VERIFY_INVARIANT => {
                let m: MsgVerifyInvariant = msg.decode()?;
                ensure_signer(msg, &m.sender)?;
                let route = format!("{}/{}", m.invariant_module_name, m.invariant_route);
                self.0.verify_invariant(ctx, &m.sender, &route)
            }
            other => Err(TxError::new(
                TxErrorKind::UnknownRequest,
                format!("unrecognized crisis message type: {other}"),
            )),
        }
    }
}

impl QueryHandler for Handler {
    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "constant_fee" => encode_response(&self.0.constant_fee(ctx)?),
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
