use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use shared_types::{Address, Coin, Coins, Event, StoreError, TxError, TxErrorKind, VoteInfo};
use tracing::debug;

use super::{DistrParams, SlashEvent, ValidatorRewards, MODULE_NAME};
use crate::bank::BankKeeper;
use crate::staking::{StakingHooks, StakingKeeper};
use crate::{mul_bps, FEE_COLLECTOR};

const REWARDS_PREFIX: &[u8] = b"rewards/";
const SLASH_PREFIX: &[u8] = b"slash/";
const COMMUNITY_POOL: &[u8] = b"community_pool";
const PARAMS: &str = "params";

pub struct DistrKeeper {
    key: StoreKey,
    bank: Arc<BankKeeper>,
    staking: Arc<StakingKeeper>,
    subspace: Subspace,
}

impl DistrKeeper {
    pub fn new(key: StoreKey, bank: Arc<BankKeeper>, staking: Arc<StakingKeeper>, subspace: Subspace) -> Self {
        Self {
            key,
            bank,
            staking,
            subspace,
        }
    }

    pub fn get_params(&self, ctx: &mut Context) -> Result<DistrParams, StoreError> {
        Ok(self.subspace.get(ctx, PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &DistrParams) -> Result<(), StoreError> {
        self.subspace.set(ctx, PARAMS, params)
    }

    pub fn community_pool(&self, ctx: &mut Context) -> Result<Coins, StoreError> {
        Ok(ctx.kv(&self.key).get_value(COMMUNITY_POOL)?.unwrap_or_default())
    }

    pub(crate) fn set_community_pool(&self, ctx: &mut Context, pool: &Coins) -> Result<(), StoreError> {
        ctx.kv(&self.key).set_value(COMMUNITY_POOL, pool)
    }

    /// Rewards accumulated by `operator` and not yet withdrawn.
    pub fn rewards(&self, ctx: &mut Context, operator: &Address) -> Result<Option<Coins>, StoreError> {
        ctx.kv(&self.key)
            .prefixed(REWARDS_PREFIX)
            .get_value(operator.as_bytes())
    }

    pub(crate) fn set_rewards(&self, ctx: &mut Context, operator: &Address, rewards: &Coins) -> Result<(), StoreError> {
        ctx.kv(&self.key)
            .prefixed(REWARDS_PREFIX)
            .set_value(operator.as_bytes(), rewards)
    }

    pub fn all_rewards(&self, ctx: &mut Context) -> Result<Vec<ValidatorRewards>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(REWARDS_PREFIX)
            .values::<Coins>(b"")?
            .into_iter()
            .filter_map(|(k, rewards)| {
                Some(ValidatorRewards {
                    validator: Address(k.as_slice().try_into().ok()?),
                    rewards,
                })
            })
            .collect())
    }

    pub(crate) fn record_slash(&self, ctx: &mut Context, event: &SlashEvent) -> Result<(), StoreError> {
        let key = [
            event.validator.as_bytes().as_slice(),
            &event.height.to_be_bytes(),
        ]
        .concat();
        ctx.kv(&self.key).prefixed(SLASH_PREFIX).set_value(&key, event)
    }

    pub fn slash_events(&self, ctx: &mut Context) -> Result<Vec<SlashEvent>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(SLASH_PREFIX)
            .values::<SlashEvent>(b"")?
            .into_iter()
            .map(|(_, e)| e)
            .collect())
    }

    /// Move the collected fees into the module account and split them
    /// between the voters of the previous block and the community pool.
    /// Integer remainders go to the community pool.
    pub fn allocate_tokens(&self, ctx: &mut Context, votes: &[VoteInfo]) -> Result<(), TxError> {
        let fee_addr = self.bank.module_address(FEE_COLLECTOR).ok_or_else(|| {
            TxError::new(TxErrorKind::UnknownAddress, "fee collector account missing")
        })?;
        let fees = self.bank.get_balance(ctx, &fee_addr)?;
        if fees.is_zero() {
            return Ok(());
        }
        self.bank
            .send_coins_from_module_to_module(ctx, FEE_COLLECTOR, MODULE_NAME, &fees)?;

        let tax_bps = self.get_params(ctx)?.community_tax_bps;
        let total_power: u128 = votes
            .iter()
            .map(|v| u128::try_from(v.power).unwrap_or(0))
            .sum();

        let mut allocated = Coins::empty();
        if total_power > 0 {
            let for_voters: Vec<Coin> = fees
                .iter()
                .map(|c| Coin::new(c.denom.clone(), c.amount - mul_bps(c.amount, tax_bps)))
                .collect();
            for vote in votes {
                let power = u128::try_from(vote.power).unwrap_or(0);
                let Some(validator) = self.staking.validator_by_cons_addr(ctx, &vote.validator)? else {
                    continue;
                };
                let share = Coins::from_unsorted(
                    for_voters
                        .iter()
                        .map(|c| Coin::new(c.denom.clone(), c.amount * power / total_power)),
                );
                if share.is_zero() {
                    continue;
                }
                let current = self.rewards(ctx, &validator.operator)?.unwrap_or_default();
                let updated = current
                    .checked_add(&share)
                    .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "rewards overflow"))?;
                self.set_rewards(ctx, &validator.operator, &updated)?;
                allocated = allocated
                    .checked_add(&share)
                    .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "rewards overflow"))?;
            }
        }

        let remainder = fees
            .checked_sub(&allocated)
            .ok_or_else(|| TxError::new(TxErrorKind::Internal, "allocated more than collected"))?;
        let pool = self
            .community_pool(ctx)?
            .checked_add(&remainder)
            .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "community pool overflow"))?;
        self.set_community_pool(ctx, &pool)?;
        debug!(
            "[Distribution] Allocated {} to voters, {} to community pool",
            allocated, remainder
        );
        Ok(())
    }

    pub fn withdraw_rewards(&self, ctx: &mut Context, operator: &Address) -> Result<Coins, TxError> {
        let rewards = self.rewards(ctx, operator)?.unwrap_or_default();
        if rewards.is_zero() {
            return Err(TxError::new(
                TxErrorKind::InvalidRequest,
                format!("no rewards to withdraw for {operator}"),
            ));
        }
        self.set_rewards(ctx, operator, &Coins::empty())?;
        self.bank
            .send_coins_from_module_to_account(ctx, MODULE_NAME, operator, &rewards)?;
        ctx.emit_event(
            Event::new("withdraw_rewards")
                .attr("validator", operator)
                .attr("amount", &rewards),
        );
        Ok(rewards)
    }

    pub fn fund_community_pool(&self, ctx: &mut Context, depositor: &Address, amount: &Coins) -> Result<(), TxError> {
        self.bank
            .send_coins_from_account_to_module(ctx, depositor, MODULE_NAME, amount)?;
        let pool = self
            .community_pool(ctx)?
            .checked_add(amount)
            .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "community pool overflow"))?;
        self.set_community_pool(ctx, &pool)?;
        Ok(())
    }

    /// Outstanding rewards plus the community pool equal the module balance.
    pub fn can_withdraw_invariant(&self, ctx: &mut Context) -> Result<(), String> {
        let mut owed = self.community_pool(ctx).map_err(|e| e.to_string())?;
        for r in self.all_rewards(ctx).map_err(|e| e.to_string())? {
            owed = owed.checked_add(&r.rewards).ok_or("rewards overflow")?;
        }
        let addr = self
            .bank
            .module_address(MODULE_NAME)
            .ok_or("distribution module account missing")?;
        let balance = self.bank.get_balance(ctx, &addr).map_err(|e| e.to_string())?;
        if owed == balance {
            Ok(())
        } else {
            Err(format!("module holds {balance} but owes {owed}"))
        }
    }
}

/// Staking hook receiver of the distribution module.
pub struct DistrHooks(pub Arc<DistrKeeper>);

impl StakingHooks for DistrHooks {
    fn after_validator_created(&self, ctx: &mut Context, operator: &Address) -> Result<(), TxError> {
        if self.0.rewards(ctx, operator)?.is_none() {
            self.0.set_rewards(ctx, operator, &Coins::empty())?;
        }
        Ok(())
    }

    fn before_validator_slashed(
        &self,
        ctx: &mut Context,
        operator: &Address,
        fraction_bps: u64,
    ) -> Result<(), TxError> {
        let event = SlashEvent {
            validator: *operator,
            height: ctx.block_height(),
            fraction_bps,
        };
        Ok(self.0.record_slash(ctx, &event)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::POWER_REDUCTION as POWER;
    use crate::testutil::*;

    fn collect_fees(h: &Harness, ctx: &mut Context, amount: u128) {
        let payer = Address::hash_of(b"payer");
        h.fund(ctx, &payer, amount);
        h.bank
            .send_coins_from_account_to_module(ctx, &payer, FEE_COLLECTOR, &stake(amount))
            .unwrap();
    }

    #[test]
    fn test_fees_split_by_power_with_tax() {
        let h = Harness::new();
        let mut ctx = h.ctx(2);
        let v1 = h.create_validator(&mut ctx, 1, 3 * POWER);
        let v2 = h.create_validator(&mut ctx, 2, POWER);
        h.staking.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        collect_fees(&h, &mut ctx, 1000);

        let votes = vec![h.vote(&mut ctx, &v1, true), h.vote(&mut ctx, &v2, false)];
        h.distr.allocate_tokens(&mut ctx, &votes).unwrap();

        // 2% tax: 980 split 3:1
        assert_eq!(h.distr.rewards(&mut ctx, &v1).unwrap(), Some(stake(735)));
        assert_eq!(h.distr.rewards(&mut ctx, &v2).unwrap(), Some(stake(245)));
        assert_eq!(h.distr.community_pool(&mut ctx).unwrap(), stake(20));
        assert_eq!(h.distr.can_withdraw_invariant(&mut ctx), Ok(()));

        let fee_addr = h.auth.module_address(FEE_COLLECTOR).unwrap();
        assert!(h.bank.get_balance(&mut ctx, &fee_addr).unwrap().is_zero());
    }

    #[test]
    fn test_withdraw_pays_operator() {
        let h = Harness::new();
        let mut ctx = h.ctx(2);
        let v1 = h.create_validator(&mut ctx, 1, POWER);
        h.staking.apply_and_return_validator_set_updates(&mut ctx).unwrap();
        collect_fees(&h, &mut ctx, 100);
        let vote = h.vote(&mut ctx, &v1, true);
        h.distr.allocate_tokens(&mut ctx, &[vote]).unwrap();

        let before = h.bank.get_balance(&mut ctx, &v1).unwrap().amount_of("stake");
        let paid = h.distr.withdraw_rewards(&mut ctx, &v1).unwrap();
        assert_eq!(paid, stake(98));
        assert_eq!(
            h.bank.get_balance(&mut ctx, &v1).unwrap().amount_of("stake"),
            before + 98
        );
        assert!(h.distr.withdraw_rewards(&mut ctx, &v1).is_err());
        assert_eq!(h.distr.can_withdraw_invariant(&mut ctx), Ok(()));
    }

    #[test]
    fn test_no_votes_sends_everything_to_community_pool() {
        let h = Harness::new();
        let mut ctx = h.ctx(2);
        collect_fees(&h, &mut ctx, 50);
        h.distr.allocate_tokens(&mut ctx, &[]).unwrap();
        assert_eq!(h.distr.community_pool(&mut ctx).unwrap(), stake(50));
    }

    #[test]
    fn test_created_hook_initializes_rewards() {
        let h = Harness::new();
        let mut ctx = h.ctx(1);
        let v1 = h.create_validator(&mut ctx, 1, POWER);
        assert_eq!(h.distr.rewards(&mut ctx, &v1).unwrap(), Some(Coins::empty()));
    }
}
