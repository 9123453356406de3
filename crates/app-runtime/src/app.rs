//! # Application
//!
//! The composition root and the entry points a consensus driver calls.
//!
//! ## Block Flow
//!
//! ```text
//! init_chain ─→ begin_block ─→ deliver_tx* ─→ end_block ─→ commit ─┐
//!                    ↑                                             │
//!                    └─────────────────────────────────────────────┘
//! ```
//!
//! Genesis writes are held in a branch and committed with the first block.
//! Block state lives in one `Context` from `begin_block` to `commit`;
//! `check_tx` runs on a separate branch that is reset at every commit.
//!
//! ## Fatal vs Recoverable
//!
//! Lifecycle calls return `AppError`; the driver must stop on any of them.
//! A rejected or failed transaction is an ordinary `TxResult` with a
//! non-zero code.

use std::collections::BTreeMap;
use std::sync::Arc;

use lc_01_state_store::{
    CacheMultiStore, CommitInfo, CommitMultiStore, Context, ExecMode, GasMeter,
};
use lc_02_module_accounts::PermissionTable;
use lc_03_module_manager::{
    BeginBlockRequest, EndBlockOutcome, EndBlockRequest, InvariantRegistry, ManagerState,
    ModuleManager, MsgServiceRouter, QueryRouter,
};
use lc_04_ante_pipeline::{Admission, AnteHandler};
use serde::{Deserialize, Serialize};
use shared_types::{
    BlockHeader, Event, GenesisError, Hash, LifecycleError, ModuleEvent, Tx, TxError, TxErrorKind,
    ValidatorUpdate,
};
use tracing::{debug, error, info, instrument, warn};

use crate::container::{mount_stores, permission_table, AppConfig, Keepers, StoreKeys};
use crate::error::AppError;
use crate::genesis::{decode_app_state, GenesisDoc};
use crate::wiring::{build_ante, build_manager, build_routers, descriptors, wire_hooks, wire_invariants};

/// Query path answered by the application itself.
pub const VERSION_QUERY: &str = "app/version";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitChainRequest {
    pub chain_id: String,
    /// Unix seconds.
    pub genesis_time: u64,
    /// JSON object keyed by module name.
    pub app_state_bytes: Vec<u8>,
}

/// Outcome of one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxResult {
    /// Zero on success, otherwise the `TxErrorKind` code.
    pub code: u32,
    pub log: String,
    pub gas_wanted: u64,
    pub gas_used: u64,
    pub events: Vec<Event>,
}

impl TxResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }

    fn failed(err: &TxError, gas_wanted: u64, gas_used: u64, events: Vec<Event>) -> Self {
        Self {
            code: err.code(),
            log: err.to_string(),
            gas_wanted,
            gas_used,
            events,
        }
    }
}

pub type EndBlockResponse = EndBlockOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResponse {
    pub height: u64,
    pub app_hash: Hash,
}

pub struct App {
    config: AppConfig,
    cms: CommitMultiStore,
    keys: StoreKeys,
    table: Arc<PermissionTable>,
    keepers: Keepers,
    manager: ModuleManager,
    invariants: Arc<InvariantRegistry>,
    msg_router: MsgServiceRouter,
    query_router: QueryRouter,
    ante: AnteHandler,
    /// Genesis writes awaiting the first commit.
    genesis_store: Option<CacheMultiStore>,
    /// Open block, from begin-block to commit.
    deliver: Option<Context>,
    check: Option<Context>,
    /// Header of the last committed block, or the genesis header.
    last_header: BlockHeader,
    genesis_time: u64,
    /// Recorded at init-chain.
    version_map: BTreeMap<String, u64>,
}

impl App {
    /// Compose the application. Every inconsistency in the module set, the
    /// orders, the store keys or the permission table fails here.
    #[instrument(skip_all, fields(chain_id = %config.chain_id))]
    pub fn build(config: AppConfig) -> Result<Self, AppError> {
        config.validate()?;

        let (keys, cms) = mount_stores()?;
        let table = Arc::new(permission_table(&config)?);
        let keepers = Keepers::build(&config, &keys, Arc::clone(&table))?;

        wire_hooks(&keepers)?;
        let manager = build_manager(descriptors(&keepers), &config.orders)?;
        let invariants = wire_invariants(&manager, &keepers)?;
        let (msg_router, query_router) = build_routers(&manager)?;
        let ante = build_ante(&keepers)?;

        info!(
            "[App] Built: {} module(s), {} invariant route(s), ante chain {:?}",
            manager.module_names().len(),
            invariants.len(),
            ante.names()
        );
        Ok(Self {
            config,
            cms,
            keys,
            table,
            keepers,
            manager,
            invariants,
            msg_router,
            query_router,
            ante,
            genesis_store: None,
            deliver: None,
            check: None,
            last_header: BlockHeader::default(),
            genesis_time: 0,
            version_map: BTreeMap::new(),
        })
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn keepers(&self) -> &Keepers {
        &self.keepers
    }

    #[must_use]
    pub fn store_keys(&self) -> &StoreKeys {
        &self.keys
    }

    #[must_use]
    pub fn permissions(&self) -> &PermissionTable {
        &self.table
    }

    #[must_use]
    pub fn manager(&self) -> &ModuleManager {
        &self.manager
    }

    #[must_use]
    pub fn ante_handler(&self) -> &AnteHandler {
        &self.ante
    }

    /// Consensus versions recorded at init-chain. Empty before.
    #[must_use]
    pub fn version_map(&self) -> &BTreeMap<String, u64> {
        &self.version_map
    }

    /// Height of the last committed block.
    #[must_use]
    pub fn last_height(&self) -> u64 {
        self.last_header.height
    }

    pub fn last_commit(&self) -> CommitInfo {
        self.cms.last_commit()
    }

    /// A genesis document with every module's default state.
    #[must_use]
    pub fn default_genesis(&self) -> GenesisDoc {
        GenesisDoc::new(
            self.config.chain_id.clone(),
            0,
            self.manager.default_genesis(),
        )
    }

    // =========================================================================
    // GENESIS
    // =========================================================================

    /// Initialize every module from the genesis state. Atomic: on failure
    /// nothing is written.
    #[instrument(skip_all, fields(chain_id = %req.chain_id))]
    pub fn init_chain(&mut self, req: InitChainRequest) -> Result<Vec<ValidatorUpdate>, AppError> {
        if req.chain_id != self.config.chain_id {
            return Err(GenesisError::ChainIdMismatch {
                configured: self.config.chain_id.clone(),
                genesis: req.chain_id,
            }
            .into());
        }
        let raw = decode_app_state(&req.app_state_bytes)?;

        let header = BlockHeader {
            chain_id: req.chain_id,
            height: 0,
            time: req.genesis_time,
            ..Default::default()
        };
        let mut ctx = Context::new(self.cms.branch(), header.clone(), ExecMode::Genesis);
        let updates = self.manager.run_genesis(&mut ctx, &raw)?;

        if self.config.skip_genesis_invariants {
            warn!("[App] Skipping genesis invariant checks");
        } else if let Err(b) = self.invariants.assert_all(&mut ctx) {
            let err = LifecycleError::InvariantBroken {
                route: b.route.clone(),
                detail: b.detail.clone(),
            };
            self.manager.halt_on(&err);
            return Err(GenesisError::InvariantBroken {
                route: b.route,
                detail: b.detail,
            }
            .into());
        }

        let store = ctx.into_store();
        self.check = Some(self.check_context(store.clone(), header.clone()));
        self.genesis_store = Some(store);
        self.version_map = self.manager.version_map();
        self.genesis_time = req.genesis_time;
        self.last_header = header;

        info!(
            "[App] Chain {} initialized with {} validator update(s)",
            self.config.chain_id,
            updates.len()
        );
        Ok(updates)
    }

    // =========================================================================
    // BLOCKS
    // =========================================================================

    pub fn begin_block(&mut self, req: BeginBlockRequest) -> Result<Vec<ModuleEvent>, AppError> {
        if self.deliver.is_some() {
            return Err(LifecycleError::PhaseViolation {
                call: "begin_block",
                state: self.manager.state().to_string(),
            }
            .into());
        }
        if req.header.chain_id != self.config.chain_id {
            return Err(LifecycleError::HeaderMismatch(format!(
                "chain id '{}', expected '{}'",
                req.header.chain_id, self.config.chain_id
            ))
            .into());
        }
        let expected = self.last_header.height + 1;
        if req.header.height != expected {
            return Err(LifecycleError::HeaderMismatch(format!(
                "height {}, expected {}",
                req.header.height, expected
            ))
            .into());
        }

        let store = match self.genesis_store.take() {
            Some(store) => store,
            None => self.cms.branch(),
        };
        let mut ctx = Context::new(store, req.header.clone(), ExecMode::BeginBlock);
        let events = self.manager.run_begin_block(&mut ctx, &req)?;
        ctx.take_events();
        self.deliver = Some(ctx);
        debug!("[App] Block {} opened", req.header.height);
        Ok(events)
    }

    /// Run a transaction against the open block.
    pub fn deliver_tx(&mut self, raw: &[u8]) -> Result<TxResult, AppError> {
        self.manager.ensure_in_block("deliver_tx")?;
        let ctx = self.deliver.as_mut().ok_or(LifecycleError::PhaseViolation {
            call: "deliver_tx",
            state: "no open block".into(),
        })?;
        let result = run_tx(&self.ante, &self.msg_router, ctx, raw, ExecMode::DeliverTx, false);
        if !result.is_ok() {
            debug!("[App] deliver_tx failed ({}): {}", result.code, result.log);
        }
        Ok(result)
    }

    /// Admission check for the mempool. Only the ante chain runs; its
    /// writes (sequence increments) persist until the next commit.
    pub fn check_tx(&mut self, raw: &[u8]) -> Result<TxResult, AppError> {
        let ctx = self.check.as_mut().ok_or(LifecycleError::PhaseViolation {
            call: "check_tx",
            state: self.manager.state().to_string(),
        })?;
        Ok(run_tx(&self.ante, &self.msg_router, ctx, raw, ExecMode::CheckTx, false))
    }

    /// Estimate gas for a transaction without committing anything.
    ///
    /// Runs the ante chain in simulation (no signature checks, no gas limit,
    /// no mempool fee) and the messages on a throwaway branch of the check
    /// state. Neither the check state nor the open block sees the writes.
    pub fn simulate(&self, raw: &[u8]) -> Result<TxResult, AppError> {
        let check = self.check.as_ref().ok_or(LifecycleError::PhaseViolation {
            call: "simulate",
            state: self.manager.state().to_string(),
        })?;
        let mut ctx = Context::new(check.store().clone(), check.header().clone(), ExecMode::DeliverTx);
        let result = run_tx(&self.ante, &self.msg_router, &mut ctx, raw, ExecMode::DeliverTx, true);
        debug!("[App] Simulated tx: code={} gas_used={}", result.code, result.gas_used);
        Ok(result)
    }

    pub fn end_block(&mut self, req: EndBlockRequest) -> Result<EndBlockResponse, AppError> {
        let ctx = self.deliver.as_mut().ok_or(LifecycleError::PhaseViolation {
            call: "end_block",
            state: "no open block".into(),
        })?;
        if req.height != ctx.block_height() {
            return Err(LifecycleError::HeaderMismatch(format!(
                "end-block height {}, open block {}",
                req.height,
                ctx.block_height()
            ))
            .into());
        }
        ctx.set_mode(ExecMode::EndBlock);
        let outcome = self.manager.run_end_block(ctx, &req)?;
        ctx.take_events();
        Ok(outcome)
    }

    /// Persist the block and reset the check state.
    pub fn commit(&mut self) -> Result<CommitResponse, AppError> {
        let phase_violation = LifecycleError::PhaseViolation {
            call: "commit",
            state: self.manager.state().to_string(),
        };
        if self.manager.state() != ManagerState::BlockEnded {
            return Err(phase_violation.into());
        }
        let ctx = self.deliver.take().ok_or(phase_violation)?;
        let header = ctx.header().clone();
        let writes = ctx.into_store().into_write_set()?;
        let info = self.cms.commit(writes).map_err(|e| {
            error!("[App] Commit of block {} failed: {}", header.height, e);
            e
        })?;

        self.check = Some(self.check_context(self.cms.branch(), header.clone()));
        self.last_header = header;
        info!(
            "[App] Committed block {} app_hash={}",
            self.last_header.height,
            hex::encode(info.root)
        );
        Ok(self.last_commit_response())
    }

    fn last_commit_response(&self) -> CommitResponse {
        CommitResponse {
            height: self.last_header.height,
            app_hash: self.cms.last_commit().root,
        }
    }

    fn check_context(&self, store: CacheMultiStore, header: BlockHeader) -> Context {
        let mut ctx = Context::new(store, header, ExecMode::CheckTx);
        ctx.set_min_gas_prices(self.config.min_gas_prices.clone());
        ctx
    }

    // =========================================================================
    // QUERIES AND EXPORT
    // =========================================================================

    /// Route a query against the last committed state.
    pub fn query(&self, path: &str, data: &[u8]) -> Result<Vec<u8>, TxError> {
        if path == VERSION_QUERY {
            return serde_json::to_vec(&self.version_map)
                .map_err(|e| TxError::new(TxErrorKind::Internal, e.to_string()));
        }
        let mut ctx = Context::new(self.cms.branch(), self.last_header.clone(), ExecMode::Query);
        self.query_router.query(&mut ctx, path, data)
    }

    /// Export the current state as a genesis document. Not allowed while a
    /// block is open.
    pub fn export_genesis(&self) -> Result<GenesisDoc, AppError> {
        let store = match &self.genesis_store {
            Some(store) => store.clone(),
            None => self.cms.branch(),
        };
        let mut ctx = Context::new(store, self.last_header.clone(), ExecMode::Query);
        let app_state = self.manager.export_genesis(&mut ctx)?;
        info!("[App] Exported genesis at height {}", self.last_header.height);
        Ok(GenesisDoc::new(
            self.config.chain_id.clone(),
            self.genesis_time,
            app_state,
        ))
    }
}

/// Decode and run one transaction on `ctx`.
///
/// The block's gas meter is put back afterwards. `simulate` is handed to the
/// ante chain unchanged. In CheckTx only the ante chain runs. In DeliverTx the messages run in their own layer: a failing
/// message discards every message write but keeps the fee and sequence
/// changes of the ante chain.
fn run_tx(
    ante: &AnteHandler,
    router: &MsgServiceRouter,
    ctx: &mut Context,
    raw: &[u8],
    mode: ExecMode,
    simulate: bool,
) -> TxResult {
    let tx = match Tx::decode(raw) {
        Ok(tx) => tx,
        Err(err) => return TxResult::failed(&err, 0, 0, Vec::new()),
    };
    let block_mode = ctx.mode();
    ctx.set_mode(mode);
    ctx.set_tx_size(raw.len() as u64);
    let block_meter = ctx.set_gas_meter(GasMeter::infinite());

    let result = execute(ante, router, ctx, &tx, mode, simulate);

    ctx.set_gas_meter(block_meter);
    ctx.set_mode(block_mode);
    result
}

fn execute(
    ante: &AnteHandler,
    router: &MsgServiceRouter,
    ctx: &mut Context,
    tx: &Tx,
    mode: ExecMode,
    simulate: bool,
) -> TxResult {
    let gas_wanted = tx.auth_info.fee.gas_limit;
    if let Some(msg) = tx
        .body
        .messages
        .iter()
        .find(|m| !router.has_route(&m.type_url))
    {
        let err = TxError::new(
            TxErrorKind::UnknownRequest,
            format!("unrecognized message type {}", msg.type_url),
        );
        return TxResult::failed(&err, gas_wanted, 0, Vec::new());
    }

    let outcome = ante.process(ctx, tx, simulate);
    if let Admission::Reject(err) = outcome.admission {
        return TxResult::failed(&err, outcome.gas_wanted, outcome.gas_used, Vec::new());
    }
    let mut events = ctx.take_events();
    if mode == ExecMode::CheckTx {
        return TxResult {
            gas_wanted,
            gas_used: ctx.gas_meter().consumed(),
            events,
            ..Default::default()
        };
    }

    let result = ctx.branch_scope(|ctx| {
        for msg in &tx.body.messages {
            router.dispatch(ctx, msg)?;
        }
        Ok::<(), TxError>(())
    });
    let gas_used = ctx.gas_meter().consumed();
    match result {
        Ok(()) => {
            events.extend(ctx.take_events());
            TxResult {
                gas_wanted,
                gas_used,
                events,
                ..Default::default()
            }
        }
        Err(err) => TxResult::failed(&err, gas_wanted, gas_used, events),
    }
}
