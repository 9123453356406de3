//! # Mint
//!
//! Block provisions. Inflation drifts toward the rate that brings the bonded
//! ratio to its goal, clamped to `[inflation_min, inflation_max]`. Each block
//! mints `annual_provisions / blocks_per_year` and hands it to the fee
//! collector, where distribution picks it up with the fees.

use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use lc_03_module_manager::{
    BeginBlockRequest, BeginBlocker, Configurator, GenesisHandler, ModuleDescriptor, QueryHandler,
    ServiceRegistrar,
};
use serde::{Deserialize, Serialize};
use shared_types::{Coins, ConfigError, Event, ModuleError, StoreError, TxError, ValidatorUpdate};
use tracing::debug;

use crate::bank::BankKeeper;
use crate::staking::StakingKeeper;
use crate::{decode_state, default_state, encode_response, encode_state, unknown_query, BPS, FEE_COLLECTOR};

pub const MODULE_NAME: &str = "mint";
pub const STORE_KEY: &str = "mint";
pub const CONSENSUS_VERSION: u64 = 1;

/// Fixed-point scale of `Minter::inflation`.
pub const PRECISION: u128 = 1_000_000_000_000;

const MINTER: &[u8] = b"minter";
const PARAMS: &str = "params";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub mint_denom: String,
    pub inflation_rate_change_bps: u64,
    pub inflation_max_bps: u64,
    pub inflation_min_bps: u64,
    pub goal_bonded_bps: u64,
    pub blocks_per_year: u64,
}

impl Default for MintParams {
    fn default() -> Self {
        Self {
            mint_denom: "stake".into(),
            inflation_rate_change_bps: 1_300,
            inflation_max_bps: 2_000,
            inflation_min_bps: 700,
            goal_bonded_bps: 6_700,
            // six-second blocks
            blocks_per_year: 6_311_520,
        }
    }
}

fn scaled(bps: u64) -> u128 {
    u128::from(bps) * PRECISION / BPS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Minter {
    /// Current annual inflation, scaled by `PRECISION`.
    pub inflation: u128,
    pub annual_provisions: u128,
}

impl Default for Minter {
    fn default() -> Self {
        Self {
            inflation: scaled(1_300),
            annual_provisions: 0,
        }
    }
}

impl Minter {
    /// Inflation for the next block given the bonded ratio (scaled by
    /// `PRECISION`).
    #[must_use]
    pub fn next_inflation(&self, params: &MintParams, bonded_ratio: u128) -> u128 {
        let p = PRECISION as i128;
        let goal = scaled(params.goal_bonded_bps).max(1) as i128;
        let rate_change = scaled(params.inflation_rate_change_bps) as i128;
        let per_year = (p - (bonded_ratio as i128) * p / goal) * rate_change / p;
        let change = per_year / i128::from(params.blocks_per_year.max(1));

        let next = (self.inflation as i128 + change).max(0) as u128;
        next.clamp(
            scaled(params.inflation_min_bps),
            scaled(params.inflation_max_bps),
        )
    }

    #[must_use]
    pub fn next_annual_provisions(&self, total_supply: u128) -> u128 {
        self.inflation.saturating_mul(total_supply) / PRECISION
    }

    #[must_use]
    pub fn block_provision(&self, params: &MintParams) -> u128 {
        self.annual_provisions / u128::from(params.blocks_per_year.max(1))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintGenesis {
    #[serde(default)]
    pub minter: Minter,
    #[serde(default)]
    pub params: MintParams,
}

pub struct MintKeeper {
    key: StoreKey,
    staking: Arc<StakingKeeper>,
    bank: Arc<BankKeeper>,
    subspace: Subspace,
}

impl MintKeeper {
    pub fn new(
        key: StoreKey,
        staking: Arc<StakingKeeper>,
        bank: Arc<BankKeeper>,
        subspace: Subspace,
    ) -> Self {
        Self {
            key,
            staking,
            bank,
            subspace,
        }
    }

    pub fn get_params(&self, ctx: &mut Context) -> Result<MintParams, StoreError> {
        Ok(self.subspace.get(ctx, PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &MintParams) -> Result<(), StoreError> {
        self.subspace.set(ctx, PARAMS, params)
    }

    pub fn get_minter(&self, ctx: &mut Context) -> Result<Minter, StoreError> {
        Ok(ctx.kv(&self.key).get_value(MINTER)?.unwrap_or_default())
    }

    pub fn set_minter(&self, ctx: &mut Context, minter: &Minter) -> Result<(), StoreError> {
        ctx.kv(&self.key).set_value(MINTER, minter)
    }

    /// Bonded tokens over the total supply of the mint denom, scaled by
    /// `PRECISION`. Zero for an empty supply.
    pub fn bonded_ratio(&self, ctx: &mut Context, denom: &str) -> Result<u128, TxError> {
        let supply = self.bank.get_supply(ctx)?.amount_of(denom);
        if supply == 0 {
            return Ok(0);
        }
        let bonded = self.staking.pool(ctx)?.bonded_tokens;
        Ok(bonded.saturating_mul(PRECISION) / supply)
    }

    /// Recompute the minter and mint this block's provision into the fee
    /// collector. Returns the minted amount.
    pub fn mint_block_provision(&self, ctx: &mut Context) -> Result<u128, TxError> {
        let params = self.get_params(ctx)?;
        let mut minter = self.get_minter(ctx)?;

        let ratio = self.bonded_ratio(ctx, &params.mint_denom)?;
        minter.inflation = minter.next_inflation(&params, ratio);
        let supply = self.bank.get_supply(ctx)?.amount_of(&params.mint_denom);
        minter.annual_provisions = minter.next_annual_provisions(supply);
        self.set_minter(ctx, &minter)?;

        let provision = minter.block_provision(&params);
        if provision > 0 {
            let coins = Coins::single(params.mint_denom.clone(), provision);
            self.bank.mint_coins(ctx, MODULE_NAME, &coins)?;
            self.bank
                .send_coins_from_module_to_module(ctx, MODULE_NAME, FEE_COLLECTOR, &coins)?;
        }
        debug!(
            "[Mint] Height {} inflation {} minted {}",
            ctx.block_height(),
            minter.inflation,
            provision
        );
        ctx.emit_event(
            Event::new("mint")
                .attr("bonded_ratio", ratio)
                .attr("inflation", minter.inflation)
                .attr("annual_provisions", minter.annual_provisions)
                .attr("amount", provision),
        );
        Ok(provision)
    }
}

pub struct MintModule {
    keeper: Arc<MintKeeper>,
}

pub fn descriptor(keeper: Arc<MintKeeper>) -> ModuleDescriptor {
    let module = Arc::new(MintModule { keeper });
    ModuleDescriptor::new(MODULE_NAME)
        .consensus_version(CONSENSUS_VERSION)
        .depends_on(crate::bank::MODULE_NAME)
        .depends_on(crate::staking::MODULE_NAME)
        .with_genesis(module.clone())
        .with_begin_block(module.clone())
        .with_services(module)
}

impl GenesisHandler for MintModule {
    fn default_genesis(&self) -> serde_json::Value {
        default_state::<MintGenesis>()
    }

    fn validate_genesis(&self, state: &serde_json::Value) -> Result<(), ModuleError> {
        let genesis: MintGenesis = decode_state(state)?;
        let p = &genesis.params;
        if p.mint_denom.is_empty() {
            return Err(ModuleError::Invalid("mint denom must not be empty".into()));
        }
        if p.blocks_per_year == 0 {
            return Err(ModuleError::Invalid("blocks per year must be positive".into()));
        }
        if p.goal_bonded_bps == 0 || u128::from(p.goal_bonded_bps) > BPS {
            return Err(ModuleError::Invalid("goal bonded must be in (0, 10000] bps".into()));
        }
        if p.inflation_min_bps > p.inflation_max_bps {
            return Err(ModuleError::Invalid(format!(
                "min inflation {} bps exceeds max inflation {} bps",
                p.inflation_min_bps, p.inflation_max_bps
            )));
        }
        Ok(())
    }

    fn init_genesis(
        &self,
        ctx: &mut Context,
        state: &serde_json::Value,
    ) -> Result<Vec<ValidatorUpdate>, ModuleError> {
        let genesis: MintGenesis = decode_state(state)?;
        self.keeper.set_minter(ctx, &genesis.minter)?;
        self.keeper.set_params(ctx, &genesis.params)?;
        Ok(Vec::new())
    }

    fn export_genesis(&self, ctx: &mut Context) -> Result<serde_json::Value, ModuleError> {
        encode_state(&MintGenesis {
            minter: self.keeper.get_minter(ctx)?,
            params: self.keeper.get_params(ctx)?,
        })
    }
}

impl BeginBlocker for MintModule {
    fn begin_block(&self, ctx: &mut Context, _req: &BeginBlockRequest) -> Result<(), ModuleError> {
        self.keeper.mint_block_provision(ctx)?;
        Ok(())
    }
}

impl ServiceRegistrar for MintModule {
    fn register_services(&self, cfg: &mut Configurator) -> Result<(), ConfigError> {
        cfg.register_query(MODULE_NAME, Arc::new(Querier(Arc::clone(&self.keeper))))
    }
}

struct Querier(Arc<MintKeeper>);

impl QueryHandler for Querier {
    fn query(&self, ctx: &mut Context, path: &str, _data: &[u8]) -> Result<Vec<u8>, TxError> {
        match path {
            "params" => encode_response(&self.0.get_params(ctx)?),
            "inflation" => encode_response(&self.0.get_minter(ctx)?.inflation.to_string()),
            "annual_provisions" => {
                encode_response(&self.0.get_minter(ctx)?.annual_provisions.to_string())
            }
            other => Err(unknown_query(MODULE_NAME, other)),
        }
    }
}
