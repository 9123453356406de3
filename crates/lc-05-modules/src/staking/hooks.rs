//! Staking event hooks.

use std::sync::Arc;

use lc_01_state_store::Context;
use shared_types::{Address, TxError};

/// Receives validator and delegation events. Every method defaults to a
/// no-op so receivers implement only what they use.
pub trait StakingHooks: Send + Sync {
    fn after_validator_created(&self, _ctx: &mut Context, _operator: &Address) -> Result<(), TxError> {
        Ok(())
    }

    fn after_validator_bonded(
        &self,
        _ctx: &mut Context,
        _cons_addr: &Address,
        _operator: &Address,
    ) -> Result<(), TxError> {
        Ok(())
    }

    fn after_validator_begin_unbonding(
        &self,
        _ctx: &mut Context,
        _cons_addr: &Address,
        _operator: &Address,
    ) -> Result<(), TxError> {
        Ok(())
    }

    fn after_delegation_modified(
        &self,
        _ctx: &mut Context,
        _delegator: &Address,
        _operator: &Address,
    ) -> Result<(), TxError> {
        Ok(())
    }

    fn before_validator_slashed(
        &self,
        _ctx: &mut Context,
        _operator: &Address,
        _fraction_bps: u64,
    ) -> Result<(), TxError> {
        Ok(())
    }
}

/// Fans every event out to several receivers, in registration order. The
/// first error stops the fan-out.
#[derive(Clone, Default)]
pub struct MultiStakingHooks(Vec<Arc<dyn StakingHooks>>);

impl MultiStakingHooks {
    pub fn new(hooks: Vec<Arc<dyn StakingHooks>>) -> Self {
        Self(hooks)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl StakingHooks for MultiStakingHooks {
    fn after_validator_created(&self, ctx: &mut Context, operator: &Address) -> Result<(), TxError> {
        self.0
            .iter()
            .try_for_each(|h| h.after_validator_created(ctx, operator))
    }

    fn after_validator_bonded(
        &self,
        ctx: &mut Context,
        cons_addr: &Address,
        operator: &Address,
    ) -> Result<(), TxError> {
        self.0
            .iter()
            .try_for_each(|h| h.after_validator_bonded(ctx, cons_addr, operator))
    }

    fn after_validator_begin_unbonding(
        &self,
        ctx: &mut Context,
        cons_addr: &Address,
        operator: &Address,
    ) -> Result<(), TxError> {
        self.0
            .iter()
            .try_for_each(|h| h.after_validator_begin_unbonding(ctx, cons_addr, operator))
    }

    fn after_delegation_modified(
        &self,
        ctx: &mut Context,
        delegator: &Address,
        operator: &Address,
    ) -> Result<(), TxError> {
        self.0
            .iter()
            .try_for_each(|h| h.after_delegation_modified(ctx, delegator, operator))
    }

    fn before_validator_slashed(
        &self,
        ctx: &mut Context,
        operator: &Address,
        fraction_bps: u64,
    ) -> Result<(), TxError> {
        self.0
            .iter()
            .try_for_each(|h| h.before_validator_slashed(ctx, operator, fraction_bps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;
    use parking_lot::Mutex;

    struct Log(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl StakingHooks for Log {
        fn after_validator_created(&self, _: &mut Context, _: &Address) -> Result<(), TxError> {
            self.1.lock().push(self.0);
            Ok(())
        }
    }

    #[test]
    fn test_multi_hooks_fan_out_in_order() {
        let h = Harness::new();
        let mut ctx = h.ctx(1);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let multi = MultiStakingHooks::new(vec![
            Arc::new(Log("distribution", calls.clone())),
            Arc::new(Log("slashing", calls.clone())),
        ]);
        multi
            .after_validator_created(&mut ctx, &Address::hash_of(b"v"))
            .unwrap();
        assert_eq!(*calls.lock(), vec!["distribution", "slashing"]);
        // defaults are no-ops
        multi
            .before_validator_slashed(&mut ctx, &Address::hash_of(b"v"), 100)
            .unwrap();
        assert_eq!(calls.lock().len(), 2);
    }
}
