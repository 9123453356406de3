use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use parking_lot::RwLock;
use shared_types::{
    Address, Coins, ConfigError, Event, StoreError, TxError, TxErrorKind, ValidatorUpdate,
};
use tracing::{debug, info, warn};

use super::hooks::StakingHooks;
use super::{BondStatus, Delegation, Pool, StakingParams, Validator, MODULE_NAME};
use crate::bank::BankKeeper;
use crate::{mul_bps, BONDED_POOL, NOT_BONDED_POOL};

const VALIDATOR_PREFIX: &[u8] = b"val/";
const CONS_INDEX_PREFIX: &[u8] = b"cons/";
const DELEGATION_PREFIX: &[u8] = b"del/";
const LAST_POWER_PREFIX: &[u8] = b"power/";
const PARAMS: &str = "params";

fn tx_err(kind: TxErrorKind, detail: impl Into<String>) -> TxError {
    TxError::new(kind, detail)
}

fn delegation_key(delegator: &Address, operator: &Address) -> Vec<u8> {
    [delegator.as_bytes().as_slice(), operator.as_bytes().as_slice()].concat()
}

fn pool_of(validator: &Validator) -> &'static str {
    if validator.is_bonded() {
        BONDED_POOL
    } else {
        NOT_BONDED_POOL
    }
}

pub struct StakingKeeper {
    key: StoreKey,
    bank: Arc<BankKeeper>,
    subspace: Subspace,
    hooks: RwLock<Option<Arc<dyn StakingHooks>>>,
}

impl StakingKeeper {
    pub fn new(key: StoreKey, bank: Arc<BankKeeper>, subspace: Subspace) -> Self {
        Self {
            key,
            bank,
            subspace,
            hooks: RwLock::new(None),
        }
    }

    /// Install the hook receiver. Allowed exactly once.
    pub fn set_hooks(&self, hooks: Arc<dyn StakingHooks>) -> Result<(), ConfigError> {
        let mut slot = self.hooks.write();
        if slot.is_some() {
            return Err(ConfigError::HooksAlreadySet(MODULE_NAME.into()));
        }
        *slot = Some(hooks);
        info!("[Staking] Hooks installed");
        Ok(())
    }

    fn hooks(&self) -> Option<Arc<dyn StakingHooks>> {
        self.hooks.read().clone()
    }

    pub(crate) fn notify_created(&self, ctx: &mut Context, operator: &Address) -> Result<(), TxError> {
        match self.hooks() {
            Some(hooks) => hooks.after_validator_created(ctx, operator),
            None => Ok(()),
        }
    }

    pub fn get_params(&self, ctx: &mut Context) -> Result<StakingParams, StoreError> {
        Ok(self.subspace.get(ctx, PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &StakingParams) -> Result<(), StoreError> {
        self.subspace.set(ctx, PARAMS, params)
    }

    pub fn get_validator(&self, ctx: &mut Context, operator: &Address) -> Result<Option<Validator>, StoreError> {
        ctx.kv(&self.key)
            .prefixed(VALIDATOR_PREFIX)
            .get_value(operator.as_bytes())
    }

    pub fn set_validator(&self, ctx: &mut Context, validator: &Validator) -> Result<(), StoreError> {
        ctx.kv(&self.key)
            .prefixed(VALIDATOR_PREFIX)
            .set_value(validator.operator.as_bytes(), validator)?;
        ctx.kv(&self.key)
            .prefixed(CONS_INDEX_PREFIX)
            .set_value(validator.consensus_address().as_bytes(), &validator.operator)
    }

    pub fn validator_by_cons_addr(
        &self,
        ctx: &mut Context,
        cons_addr: &Address,
    ) -> Result<Option<Validator>, StoreError> {
        let operator: Option<Address> = ctx
            .kv(&self.key)
            .prefixed(CONS_INDEX_PREFIX)
            .get_value(cons_addr.as_bytes())?;
        match operator {
            Some(op) => self.get_validator(ctx, &op),
            None => Ok(None),
        }
    }

    /// Every validator in operator-address order.
    pub fn validators(&self, ctx: &mut Context) -> Result<Vec<Validator>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(VALIDATOR_PREFIX)
            .values::<Validator>(b"")?
            .into_iter()
            .map(|(_, v)| v)
            .collect())
    }

    pub fn get_delegation(
        &self,
        ctx: &mut Context,
        delegator: &Address,
        operator: &Address,
    ) -> Result<Option<Delegation>, StoreError> {
        ctx.kv(&self.key)
            .prefixed(DELEGATION_PREFIX)
            .get_value(&delegation_key(delegator, operator))
    }

    pub fn set_delegation(&self, ctx: &mut Context, delegation: &Delegation) -> Result<(), StoreError> {
        ctx.kv(&self.key)
            .prefixed(DELEGATION_PREFIX)
            .set_value(&delegation_key(&delegation.delegator, &delegation.validator), delegation)
    }

    pub fn delegations(&self, ctx: &mut Context) -> Result<Vec<Delegation>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(DELEGATION_PREFIX)
            .values::<Delegation>(b"")?
            .into_iter()
            .map(|(_, d)| d)
            .collect())
    }

    fn last_power(&self, ctx: &mut Context, operator: &Address) -> Result<i64, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(LAST_POWER_PREFIX)
            .get_value(operator.as_bytes())?
            .unwrap_or(0))
    }

    fn set_last_power(&self, ctx: &mut Context, operator: &Address, power: i64) -> Result<(), StoreError> {
        let mut kv = ctx.kv(&self.key).prefixed(LAST_POWER_PREFIX);
        if power == 0 {
            kv.delete(operator.as_bytes())
        } else {
            kv.set_value(operator.as_bytes(), &power)
        }
    }

    /// Last power reported to consensus, per operator.
    pub fn last_powers(&self, ctx: &mut Context) -> Result<BTreeMap<Address, i64>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(LAST_POWER_PREFIX)
            .values::<i64>(b"")?
            .into_iter()
            .filter_map(|(k, p)| Some((Address(k.as_slice().try_into().ok()?), p)))
            .collect())
    }

    pub fn create_validator(
        &self,
        ctx: &mut Context,
        operator: &Address,
        pub_key: &shared_types::PubKey,
        amount: u128,
    ) -> Result<(), TxError> {
        if self.get_validator(ctx, operator)?.is_some() {
            return Err(tx_err(
                TxErrorKind::InvalidRequest,
                format!("validator {operator} already exists"),
            ));
        }
        if self.validator_by_cons_addr(ctx, &pub_key.address())?.is_some() {
            return Err(tx_err(
                TxErrorKind::InvalidRequest,
                "validator already exists for this pubkey",
            ));
        }
        let validator = Validator {
            operator: *operator,
            consensus_pubkey: *pub_key,
            tokens: 0,
            delegator_shares: 0,
            status: BondStatus::Unbonded,
            jailed: false,
        };
        self.set_validator(ctx, &validator)?;
        self.notify_created(ctx, operator)?;
        ctx.emit_event(Event::new("create_validator").attr("validator", operator));
        self.delegate(ctx, operator, operator, amount)?;
        Ok(())
    }

    /// Bond `amount` of the bond denom from `delegator` to `operator`.
    /// Returns the shares issued.
    pub fn delegate(
        &self,
        ctx: &mut Context,
        delegator: &Address,
        operator: &Address,
        amount: u128,
    ) -> Result<u128, TxError> {
        if amount == 0 {
            return Err(tx_err(TxErrorKind::InvalidCoins, "delegation amount is zero"));
        }
        let mut validator = self.get_validator(ctx, operator)?.ok_or_else(|| {
            tx_err(
                TxErrorKind::InvalidRequest,
                format!("validator {operator} does not exist"),
            )
        })?;
        let denom = self.get_params(ctx)?.bond_denom;
        let shares = validator
            .shares_for(amount)
            .ok_or_else(|| tx_err(TxErrorKind::InvalidCoins, "share computation overflow"))?;

        self.bank.delegate_coins_from_account_to_module(
            ctx,
            delegator,
            pool_of(&validator),
            &Coins::single(denom, amount),
        )?;

        validator.tokens += amount;
        validator.delegator_shares += shares;
        self.set_validator(ctx, &validator)?;

        let mut delegation = self
            .get_delegation(ctx, delegator, operator)?
            .unwrap_or(Delegation {
                delegator: *delegator,
                validator: *operator,
                shares: 0,
            });
        delegation.shares += shares;
        self.set_delegation(ctx, &delegation)?;

        if let Some(hooks) = self.hooks() {
            hooks.after_delegation_modified(ctx, delegator, operator)?;
        }
        ctx.emit_event(
            Event::new("delegate")
                .attr("validator", operator)
                .attr("amount", amount),
        );
        Ok(shares)
    }

    /// Burn `fraction_bps` of the validator's tokens. Unknown validators are
    /// ignored. Returns the burned amount.
    pub fn slash(&self, ctx: &mut Context, cons_addr: &Address, fraction_bps: u64) -> Result<u128, TxError> {
        let Some(mut validator) = self.validator_by_cons_addr(ctx, cons_addr)? else {
            warn!("[Staking] Ignoring slash of unknown validator {}", cons_addr);
            return Ok(0);
        };
        let amount = mul_bps(validator.tokens, fraction_bps);
        if let Some(hooks) = self.hooks() {
            hooks.before_validator_slashed(ctx, &validator.operator, fraction_bps)?;
        }
        if amount > 0 {
            let denom = self.get_params(ctx)?.bond_denom;
            self.bank
                .burn_coins(ctx, pool_of(&validator), &Coins::single(denom, amount))?;
            validator.tokens -= amount;
            self.set_validator(ctx, &validator)?;
        }
        info!(
            "[Staking] Slashed validator {} by {} bps ({} tokens)",
            validator.operator, fraction_bps, amount
        );
        ctx.emit_event(
            Event::new("slash")
                .attr("address", cons_addr)
                .attr("burned", amount),
        );
        Ok(amount)
    }

    fn set_jailed(&self, ctx: &mut Context, cons_addr: &Address, jailed: bool) -> Result<(), TxError> {
        let mut validator = self.validator_by_cons_addr(ctx, cons_addr)?.ok_or_else(|| {
            tx_err(
                TxErrorKind::InvalidRequest,
                format!("no validator with consensus address {cons_addr}"),
            )
        })?;
        if validator.jailed == jailed {
            return Err(tx_err(
                TxErrorKind::InvalidRequest,
                if jailed {
                    "validator already jailed"
                } else {
                    "validator not jailed"
                },
            ));
        }
        validator.jailed = jailed;
        self.set_validator(ctx, &validator)?;
        Ok(())
    }

    pub fn jail(&self, ctx: &mut Context, cons_addr: &Address) -> Result<(), TxError> {
        self.set_jailed(ctx, cons_addr, true)
    }

    pub fn unjail(&self, ctx: &mut Context, cons_addr: &Address) -> Result<(), TxError> {
        self.set_jailed(ctx, cons_addr, false)
    }

    /// Recompute the bonded set, move tokens between the pools for every
    /// status change and return the power changes since the last call.
    ///
    /// The bonded set is the top `max_validators` unjailed validators with
    /// non-zero potential power, by power then operator address. Updates are
    /// in operator-address order.
    pub fn apply_and_return_validator_set_updates(
        &self,
        ctx: &mut Context,
    ) -> Result<Vec<ValidatorUpdate>, TxError> {
        let params = self.get_params(ctx)?;
        let validators = self.validators(ctx)?;

        let mut ranked: Vec<&Validator> = validators
            .iter()
            .filter(|v| !v.jailed && v.potential_power() > 0)
            .collect();
        ranked.sort_by(|a, b| {
            b.potential_power()
                .cmp(&a.potential_power())
                .then(a.operator.cmp(&b.operator))
        });
        let bonded: BTreeSet<Address> = ranked
            .iter()
            .take(params.max_validators as usize)
            .map(|v| v.operator)
            .collect();

        let mut updates = Vec::new();
        for mut validator in validators {
            let should_bond = bonded.contains(&validator.operator);
            let cons_addr = validator.consensus_address();
            let tokens = Coins::single(params.bond_denom.clone(), validator.tokens);

            if should_bond && !validator.is_bonded() {
                self.bank
                    .send_coins_from_module_to_module(ctx, NOT_BONDED_POOL, BONDED_POOL, &tokens)?;
                validator.status = BondStatus::Bonded;
                self.set_validator(ctx, &validator)?;
                if let Some(hooks) = self.hooks() {
                    hooks.after_validator_bonded(ctx, &cons_addr, &validator.operator)?;
                }
                debug!("[Staking] Bonded validator {}", validator.operator);
            } else if !should_bond && validator.is_bonded() {
                self.bank
                    .send_coins_from_module_to_module(ctx, BONDED_POOL, NOT_BONDED_POOL, &tokens)?;
                validator.status = BondStatus::Unbonded;
                self.set_validator(ctx, &validator)?;
                if let Some(hooks) = self.hooks() {
                    hooks.after_validator_begin_unbonding(ctx, &cons_addr, &validator.operator)?;
                }
                debug!("[Staking] Unbonded validator {}", validator.operator);
            }

            let power = if should_bond {
                validator.potential_power()
            } else {
                0
            };
            if power != self.last_power(ctx, &validator.operator)? {
                self.set_last_power(ctx, &validator.operator, power)?;
                updates.push(ValidatorUpdate {
                    pub_key: validator.consensus_pubkey,
                    power,
                });
            }
        }
        if !updates.is_empty() {
            info!("[Staking] {} validator update(s)", updates.len());
        }
        Ok(updates)
    }

    pub fn pool(&self, ctx: &mut Context) -> Result<Pool, TxError> {
        let denom = self.get_params(ctx)?.bond_denom;
        let balance = |ctx: &mut Context, module: &str| -> Result<u128, TxError> {
            let addr = self.bank.module_address(module).ok_or_else(|| {
                tx_err(
                    TxErrorKind::UnknownAddress,
                    format!("module account {module} does not exist"),
                )
            })?;
            Ok(self.bank.get_balance(ctx, &addr)?.amount_of(&denom))
        };
        Ok(Pool {
            bonded_tokens: balance(ctx, BONDED_POOL)?,
            not_bonded_tokens: balance(ctx, NOT_BONDED_POOL)?,
        })
    }

    /// Pool balances match the tokens of the validators in each status.
    pub fn module_accounts_invariant(&self, ctx: &mut Context) -> Result<(), String> {
        let pool = self.pool(ctx).map_err(|e| e.to_string())?;
        let (mut bonded, mut not_bonded) = (0u128, 0u128);
        for v in self.validators(ctx).map_err(|e| e.to_string())? {
            if v.is_bonded() {
                bonded += v.tokens;
            } else {
                not_bonded += v.tokens;
            }
        }
        if pool.bonded_tokens != bonded || pool.not_bonded_tokens != not_bonded {
            return Err(format!(
                "bonded pool {} vs validators {}, not-bonded pool {} vs validators {}",
                pool.bonded_tokens, bonded, pool.not_bonded_tokens, not_bonded
            ));
        }
        Ok(())
    }

    /// Each validator's shares equal the sum of its delegations.
    pub fn delegator_shares_invariant(&self, ctx: &mut Context) -> Result<(), String> {
        let mut sums: BTreeMap<Address, u128> = BTreeMap::new();
        for d in self.delegations(ctx).map_err(|e| e.to_string())? {
            *sums.entry(d.validator).or_default() += d.shares;
        }
        for v in self.validators(ctx).map_err(|e| e.to_string())? {
            let sum = sums.get(&v.operator).copied().unwrap_or(0);
            if sum != v.delegator_shares {
                return Err(format!(
                    "validator {} has {} shares but delegations sum to {}",
                    v.operator, v.delegator_shares, sum
                ));
            }
        }
        Ok(())
    }
}
