use std::collections::BTreeMap;
use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use shared_types::{Address, Event, StoreError, TxError, TxErrorKind};
use tracing::{info, warn};

use super::{MissedBlocks, SigningInfo, SlashingParams};
use crate::staking::{StakingHooks, StakingKeeper};

const INFO_PREFIX: &[u8] = b"info/";
const MISSED_PREFIX: &[u8] = b"missed/";
const PARAMS: &str = "params";

fn missed_key(cons_addr: &Address, index: u64) -> Vec<u8> {
    [cons_addr.as_bytes().as_slice(), &index.to_be_bytes()].concat()
}

pub struct SlashingKeeper {
    key: StoreKey,
    staking: Arc<StakingKeeper>,
    subspace: Subspace,
}

impl SlashingKeeper {
    pub fn new(key: StoreKey, staking: Arc<StakingKeeper>, subspace: Subspace) -> Self {
        Self {
            key,
            staking,
            subspace,
        }
    }

    pub fn get_params(&self, ctx: &mut Context) -> Result<SlashingParams, StoreError> {
        Ok(self.subspace.get(ctx, PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &SlashingParams) -> Result<(), StoreError> {
        self.subspace.set(ctx, PARAMS, params)
    }

    pub fn signing_info(&self, ctx: &mut Context, cons_addr: &Address) -> Result<Option<SigningInfo>, StoreError> {
        ctx.kv(&self.key)
            .prefixed(INFO_PREFIX)
            .get_value(cons_addr.as_bytes())
    }

    pub fn set_signing_info(&self, ctx: &mut Context, info: &SigningInfo) -> Result<(), StoreError> {
        ctx.kv(&self.key)
            .prefixed(INFO_PREFIX)
            .set_value(info.address.as_bytes(), info)
    }

    pub fn signing_infos(&self, ctx: &mut Context) -> Result<Vec<SigningInfo>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(INFO_PREFIX)
            .values::<SigningInfo>(b"")?
            .into_iter()
            .map(|(_, i)| i)
            .collect())
    }

    fn is_missed(&self, ctx: &mut Context, cons_addr: &Address, index: u64) -> Result<bool, StoreError> {
        ctx.kv(&self.key)
            .prefixed(MISSED_PREFIX)
            .has(&missed_key(cons_addr, index))
    }

    pub(crate) fn set_missed(
        &self,
        ctx: &mut Context,
        cons_addr: &Address,
        index: u64,
        missed: bool,
    ) -> Result<(), StoreError> {
        let mut kv = ctx.kv(&self.key).prefixed(MISSED_PREFIX);
        if missed {
            kv.set(&missed_key(cons_addr, index), vec![1])
        } else {
            kv.delete(&missed_key(cons_addr, index))
        }
    }

    fn clear_missed(&self, ctx: &mut Context, cons_addr: &Address) -> Result<(), StoreError> {
        let mut kv = ctx.kv(&self.key).prefixed(MISSED_PREFIX);
        for (k, _) in kv.iter_prefix(cons_addr.as_bytes())? {
            kv.delete(&k)?;
        }
        Ok(())
    }

    /// Missed indexes per validator, in address order.
    pub fn missed_blocks(&self, ctx: &mut Context) -> Result<Vec<MissedBlocks>, StoreError> {
        let mut by_addr: BTreeMap<Address, Vec<u64>> = BTreeMap::new();
        for (k, _) in ctx.kv(&self.key).prefixed(MISSED_PREFIX).iter_prefix(b"")? {
            let (addr, index) = k.split_at(20);
            let (Ok(addr), Ok(index)) = (<[u8; 20]>::try_from(addr), <[u8; 8]>::try_from(index)) else {
                continue;
            };
            by_addr
                .entry(Address(addr))
                .or_default()
                .push(u64::from_be_bytes(index));
        }
        Ok(by_addr
            .into_iter()
            .map(|(address, indexes)| MissedBlocks { address, indexes })
            .collect())
    }

    /// Record one vote of the previous block and punish the validator if it
    /// fell below the liveness threshold.
    pub fn handle_validator_signature(
        &self,
        ctx: &mut Context,
        cons_addr: &Address,
        power: i64,
        signed: bool,
    ) -> Result<(), TxError> {
        let height = ctx.block_height();
        let params = self.get_params(ctx)?;
        let mut info = self.signing_info(ctx, cons_addr)?.ok_or_else(|| {
            TxError::new(
                TxErrorKind::Internal,
                format!("expected signing info for validator {cons_addr} but not found"),
            )
        })?;

        let window = params.signed_blocks_window.max(1);
        let index = info.index_offset % window;
        info.index_offset += 1;

        let previously_missed = self.is_missed(ctx, cons_addr, index)?;
        let missed = !signed;
        match (previously_missed, missed) {
            (false, true) => {
                self.set_missed(ctx, cons_addr, index, true)?;
                info.missed_blocks_counter += 1;
            }
            (true, false) => {
                self.set_missed(ctx, cons_addr, index, false)?;
                info.missed_blocks_counter = info.missed_blocks_counter.saturating_sub(1);
            }
            _ => {}
        }
        if missed {
            ctx.emit_event(
                Event::new("liveness")
                    .attr("address", cons_addr)
                    .attr("missed_blocks", info.missed_blocks_counter)
                    .attr("height", height),
            );
        }

        let min_height = info.start_height + window;
        if height > min_height && info.missed_blocks_counter > params.max_missed() {
            match self.staking.validator_by_cons_addr(ctx, cons_addr)? {
                Some(validator) if !validator.jailed => {
                    warn!(
                        "[Slashing] Validator {} missed {} of {} blocks, power {}; slashing and jailing",
                        cons_addr, info.missed_blocks_counter, window, power
                    );
                    self.staking
                        .slash(ctx, cons_addr, params.slash_fraction_downtime_bps)?;
                    self.staking.jail(ctx, cons_addr)?;
                    info.jailed_until = ctx.block_time() + params.downtime_jail_duration;
                    info.missed_blocks_counter = 0;
                    info.index_offset = 0;
                    self.clear_missed(ctx, cons_addr)?;
                    ctx.emit_event(
                        Event::new("slash")
                            .attr("address", cons_addr)
                            .attr("reason", "missing_signature")
                            .attr("jailed", cons_addr),
                    );
                }
                _ => {}
            }
        }
        self.set_signing_info(ctx, &info)?;
        Ok(())
    }

    pub fn unjail(&self, ctx: &mut Context, operator: &Address) -> Result<(), TxError> {
        let validator = self.staking.get_validator(ctx, operator)?.ok_or_else(|| {
            TxError::new(
                TxErrorKind::InvalidRequest,
                format!("no validator for operator {operator}"),
            )
        })?;
        if !validator.jailed {
            return Err(TxError::new(TxErrorKind::InvalidRequest, "validator not jailed"));
        }
        let cons_addr = validator.consensus_address();
        let info = self.signing_info(ctx, &cons_addr)?.ok_or_else(|| {
            TxError::new(TxErrorKind::InvalidRequest, "no validator signing info found")
        })?;
        if ctx.block_time() < info.jailed_until {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                format!("validator still jailed until {}", info.jailed_until),
            ));
        }
        self.staking.unjail(ctx, &cons_addr)?;
        info!("[Slashing] Unjailed validator {}", operator);
        Ok(())
    }
}

/// Staking hook receiver of the slashing module.
pub struct SlashingHooks(pub Arc<SlashingKeeper>);

impl StakingHooks for SlashingHooks {
    fn after_validator_bonded(
        &self,
        ctx: &mut Context,
        cons_addr: &Address,
        _operator: &Address,
    ) -> Result<(), TxError> {
        if self.0.signing_info(ctx, cons_addr)?.is_none() {
            let info = SigningInfo {
                address: *cons_addr,
                start_height: ctx.block_height(),
                index_offset: 0,
                missed_blocks_counter: 0,
                jailed_until: 0,
            };
            self.0.set_signing_info(ctx, &info)?;
        }
        Ok(())
    }
}
