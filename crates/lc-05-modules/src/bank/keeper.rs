use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use lc_02_module_accounts::Permission;
use lc_04_ante_pipeline::ports as ante;
use shared_types::{Address, Coins, Event, StoreError, TxError, TxErrorKind};
use tracing::debug;

use super::{Balance, BankParams};
use crate::auth::AuthKeeper;

const BALANCE_PREFIX: &[u8] = b"balances/";
const SUPPLY: &[u8] = b"supply";
const PARAMS: &str = "params";

pub struct BankKeeper {
    key: StoreKey,
    ak: Arc<AuthKeeper>,
    subspace: Subspace,
}

impl BankKeeper {
    pub fn new(key: StoreKey, ak: Arc<AuthKeeper>, subspace: Subspace) -> Self {
        Self { key, ak, subspace }
    }

    pub fn get_params(&self, ctx: &mut Context) -> Result<BankParams, StoreError> {
        Ok(self.subspace.get(ctx, PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &BankParams) -> Result<(), StoreError> {
        self.subspace.set(ctx, PARAMS, params)
    }

    #[must_use]
    pub fn module_address(&self, name: &str) -> Option<Address> {
        self.ak.module_address(name)
    }

    /// True if `addr` is a module account that may not receive transfers.
    #[must_use]
    pub fn is_blocked(&self, addr: &Address) -> bool {
        self.ak.permissions().is_blocked(addr)
    }

    pub fn get_balance(&self, ctx: &mut Context, addr: &Address) -> Result<Coins, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(BALANCE_PREFIX)
            .get_value(addr.as_bytes())?
            .unwrap_or_default())
    }

    pub(crate) fn set_balance(&self, ctx: &mut Context, addr: &Address, coins: &Coins) -> Result<(), StoreError> {
        let mut kv = ctx.kv(&self.key).prefixed(BALANCE_PREFIX);
        if coins.is_zero() {
            kv.delete(addr.as_bytes())
        } else {
            kv.set_value(addr.as_bytes(), coins)
        }
    }

    /// All non-zero balances in address order.
    pub fn balances(&self, ctx: &mut Context) -> Result<Vec<Balance>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(BALANCE_PREFIX)
            .values::<Coins>(b"")?
            .into_iter()
            .filter_map(|(k, coins)| {
                let bytes: [u8; 20] = k.as_slice().try_into().ok()?;
                Some(Balance {
                    address: Address(bytes),
                    coins,
                })
            })
            .collect())
    }

    pub fn get_supply(&self, ctx: &mut Context) -> Result<Coins, StoreError> {
        Ok(ctx.kv(&self.key).get_value(SUPPLY)?.unwrap_or_default())
    }

    pub(crate) fn set_supply(&self, ctx: &mut Context, supply: &Coins) -> Result<(), StoreError> {
        ctx.kv(&self.key).set_value(SUPPLY, supply)
    }

    fn sub_balance(&self, ctx: &mut Context, addr: &Address, amount: &Coins) -> Result<(), TxError> {
        let balance = self.get_balance(ctx, addr)?;
        let left = balance.checked_sub(amount).ok_or_else(|| {
            TxError::new(
                TxErrorKind::InsufficientFunds,
                format!("{balance} is smaller than {amount}"),
            )
        })?;
        Ok(self.set_balance(ctx, addr, &left)?)
    }

    fn add_balance(&self, ctx: &mut Context, addr: &Address, amount: &Coins) -> Result<(), TxError> {
        let sum = self
            .get_balance(ctx, addr)?
            .checked_add(amount)
            .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "balance overflow"))?;
        Ok(self.set_balance(ctx, addr, &sum)?)
    }

    /// Move `amount` between two accounts, creating the recipient account if
    /// needed. No blocked-address check; message handlers do that.
    pub fn send_coins(
        &self,
        ctx: &mut Context,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> Result<(), TxError> {
        self.sub_balance(ctx, from, amount)?;
        self.add_balance(ctx, to, amount)?;
        self.ak.ensure_account(ctx, to)?;
        ctx.emit_event(
            Event::new("transfer")
                .attr("recipient", to)
                .attr("sender", from)
                .attr("amount", amount),
        );
        Ok(())
    }

    fn module_addr(&self, module: &str) -> Result<Address, TxError> {
        self.ak.module_address(module).ok_or_else(|| {
            TxError::new(
                TxErrorKind::UnknownAddress,
                format!("module account {module} does not exist"),
            )
        })
    }

    fn require_permission(&self, module: &str, perm: Permission, action: &str) -> Result<(), TxError> {
        if self.ak.permissions().has_permission(module, perm) {
            Ok(())
        } else {
            Err(TxError::new(
                TxErrorKind::Unauthorized,
                format!("module account {module} does not have permissions to {action}"),
            ))
        }
    }

    pub fn send_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), TxError> {
        let to = self.module_addr(module)?;
        self.send_coins(ctx, from, &to, amount)
    }

    pub fn send_coins_from_module_to_account(
        &self,
        ctx: &mut Context,
        module: &str,
        to: &Address,
        amount: &Coins,
    ) -> Result<(), TxError> {
        let from = self.module_addr(module)?;
        if self.is_blocked(to) {
            return Err(TxError::new(
                TxErrorKind::BlockedAddress,
                format!("{to} is not allowed to receive funds"),
            ));
        }
        self.send_coins(ctx, &from, to, amount)
    }

    pub fn send_coins_from_module_to_module(
        &self,
        ctx: &mut Context,
        from_module: &str,
        to_module: &str,
        amount: &Coins,
    ) -> Result<(), TxError> {
        let from = self.module_addr(from_module)?;
        let to = self.module_addr(to_module)?;
        self.send_coins(ctx, &from, &to, amount)
    }

    /// Stake from an account into a staking pool.
    pub fn delegate_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), TxError> {
        self.require_permission(module, Permission::Staking, "receive delegated coins")?;
        self.send_coins_from_account_to_module(ctx, from, module, amount)
    }

    pub fn undelegate_coins_from_module_to_account(
        &self,
        ctx: &mut Context,
        module: &str,
        to: &Address,
        amount: &Coins,
    ) -> Result<(), TxError> {
        self.require_permission(module, Permission::Staking, "undelegate coins")?;
        let from = self.module_addr(module)?;
        self.send_coins(ctx, &from, to, amount)
    }

    pub fn mint_coins(&self, ctx: &mut Context, module: &str, amount: &Coins) -> Result<(), TxError> {
        self.require_permission(module, Permission::Minter, "mint tokens")?;
        let addr = self.module_addr(module)?;
        self.add_balance(ctx, &addr, amount)?;
        let supply = self
            .get_supply(ctx)?
            .checked_add(amount)
            .ok_or_else(|| TxError::new(TxErrorKind::InvalidCoins, "supply overflow"))?;
        self.set_supply(ctx, &supply)?;
        debug!("[Bank] Minted {} to {}", amount, module);
        ctx.emit_event(Event::new("coinbase").attr("minter", addr).attr("amount", amount));
        Ok(())
    }

    pub fn burn_coins(&self, ctx: &mut Context, module: &str, amount: &Coins) -> Result<(), TxError> {
        self.require_permission(module, Permission::Burner, "burn tokens")?;
        let addr = self.module_addr(module)?;
        self.sub_balance(ctx, &addr, amount)?;
        let supply = self.get_supply(ctx)?.checked_sub(amount).ok_or_else(|| {
            TxError::new(TxErrorKind::InsufficientFunds, "burn exceeds total supply")
        })?;
        self.set_supply(ctx, &supply)?;
        debug!("[Bank] Burned {} from {}", amount, module);
        ctx.emit_event(Event::new("burn").attr("burner", addr).attr("amount", amount));
        Ok(())
    }

    /// Sum of all balances must equal the recorded supply.
    pub fn total_supply_invariant(&self, ctx: &mut Context) -> Result<(), String> {
        let mut sum = Coins::empty();
        for balance in self.balances(ctx).map_err(|e| e.to_string())? {
            sum = sum
                .checked_add(&balance.coins)
                .ok_or("balance sum overflows")?;
        }
        let supply = self.get_supply(ctx).map_err(|e| e.to_string())?;
        if sum == supply {
            Ok(())
        } else {
            Err(format!("sum of accounts coins: {sum}, total supply: {supply}"))
        }
    }
}

impl ante::BankKeeper for BankKeeper {
    fn send_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), TxError> {
        BankKeeper::send_coins_from_account_to_module(self, ctx, from, module, amount)
    }
}

#[cfg(test)]
mod tests {
    use crate::testutil::*;
    use crate::{BONDED_POOL, FEE_COLLECTOR};
    use shared_types::{Address, Coins, TxErrorKind};

    #[test]
    fn test_send_moves_funds_and_creates_recipient() {
        let h = Harness::new();
        let mut ctx = h.ctx(1);
        let (alice, bob) = (Address::hash_of(b"alice"), Address::hash_of(b"bob"));
        h.fund(&mut ctx, &alice, 100);

        h.bank.send_coins(&mut ctx, &alice, &bob, &stake(30)).unwrap();
        assert_eq!(h.bank.get_balance(&mut ctx, &alice).unwrap(), stake(70));
        assert_eq!(h.bank.get_balance(&mut ctx, &bob).unwrap(), stake(30));
        assert!(h.auth.has_account(&mut ctx, &bob).unwrap());

        let err = h.bank.send_coins(&mut ctx, &bob, &alice, &stake(31)).unwrap_err();
        assert_eq!(err.kind, TxErrorKind::InsufficientFunds);
        assert_eq!(h.bank.total_supply_invariant(&mut ctx), Ok(()));
    }

    #[test]
    fn test_module_permissions_enforced() {
        let h = Harness::new();
        let mut ctx = h.ctx(1);
        // fee_collector holds no permissions
        let err = h.bank.mint_coins(&mut ctx, FEE_COLLECTOR, &stake(1)).unwrap_err();
        assert_eq!(err.kind, TxErrorKind::Unauthorized);
        let err = h.bank.burn_coins(&mut ctx, "mint", &stake(1)).unwrap_err();
        assert_eq!(err.kind, TxErrorKind::Unauthorized);

        h.bank.mint_coins(&mut ctx, "mint", &stake(5)).unwrap();
        h.bank
            .send_coins_from_module_to_module(&mut ctx, "mint", BONDED_POOL, &stake(5))
            .unwrap();
        h.bank.burn_coins(&mut ctx, BONDED_POOL, &stake(2)).unwrap();
        assert_eq!(h.bank.get_supply(&mut ctx).unwrap(), stake(3));
        assert_eq!(h.bank.total_supply_invariant(&mut ctx), Ok(()));
    }

    #[test]
    fn test_blocked_module_account_cannot_receive() {
        let h = Harness::new();
        let mut ctx = h.ctx(1);
        h.bank.mint_coins(&mut ctx, "mint", &stake(5)).unwrap();
        let fee = h.auth.module_address(FEE_COLLECTOR).unwrap();
        let err = h
            .bank
            .send_coins_from_module_to_account(&mut ctx, "mint", &fee, &stake(1))
            .unwrap_err();
        assert_eq!(err.kind, TxErrorKind::BlockedAddress);
    }

    #[test]
    fn test_supply_invariant_detects_drift() {
        let h = Harness::new();
        let mut ctx = h.ctx(1);
        h.fund(&mut ctx, &Address::hash_of(b"alice"), 10);
        h.bank.set_supply(&mut ctx, &Coins::single("stake", 11)).unwrap();
        assert!(h.bank.total_supply_invariant(&mut ctx).is_err());
    }
}
