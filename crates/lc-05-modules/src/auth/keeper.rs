use std::sync::Arc;

use lc_01_state_store::{Context, StoreKey, Subspace};
use lc_02_module_accounts::PermissionTable;
use lc_04_ante_pipeline::ports as ante;
use shared_types::{Address, AuthParams, BaseAccount, StoreError, TxError, TxErrorKind};
use tracing::debug;

const ACCOUNT_PREFIX: &[u8] = b"acc/";
const NEXT_ACCOUNT_NUMBER: &[u8] = b"next_account_number";
const PARAMS: &str = "params";

pub struct AuthKeeper {
    key: StoreKey,
    subspace: Subspace,
    permissions: Arc<PermissionTable>,
}

impl AuthKeeper {
    pub fn new(key: StoreKey, subspace: Subspace, permissions: Arc<PermissionTable>) -> Self {
        Self {
            key,
            subspace,
            permissions,
        }
    }

    #[must_use]
    pub fn permissions(&self) -> &PermissionTable {
        &self.permissions
    }

    pub fn get_params(&self, ctx: &mut Context) -> Result<AuthParams, StoreError> {
        Ok(self.subspace.get(ctx, PARAMS)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &AuthParams) -> Result<(), StoreError> {
        self.subspace.set(ctx, PARAMS, params)
    }

    pub fn get_account(&self, ctx: &mut Context, addr: &Address) -> Result<Option<BaseAccount>, StoreError> {
        ctx.kv(&self.key)
            .prefixed(ACCOUNT_PREFIX)
            .get_value(addr.as_bytes())
    }

    pub fn has_account(&self, ctx: &mut Context, addr: &Address) -> Result<bool, StoreError> {
        ctx.kv(&self.key).prefixed(ACCOUNT_PREFIX).has(addr.as_bytes())
    }

    pub fn set_account(&self, ctx: &mut Context, account: &BaseAccount) -> Result<(), StoreError> {
        ctx.kv(&self.key)
            .prefixed(ACCOUNT_PREFIX)
            .set_value(account.address.as_bytes(), account)
    }

    /// Every stored account in address order.
    pub fn accounts(&self, ctx: &mut Context) -> Result<Vec<BaseAccount>, StoreError> {
        Ok(ctx
            .kv(&self.key)
            .prefixed(ACCOUNT_PREFIX)
            .values::<BaseAccount>(b"")?
            .into_iter()
            .map(|(_, acc)| acc)
            .collect())
    }

    /// Hand out the next account number.
    pub fn next_account_number(&self, ctx: &mut Context) -> Result<u64, StoreError> {
        let number: u64 = ctx.kv(&self.key).get_value(NEXT_ACCOUNT_NUMBER)?.unwrap_or(0);
        let next = number
            .checked_add(1)
            .ok_or_else(|| StoreError::Overflow("account numbers exhausted".into()))?;
        ctx.kv(&self.key).set_value(NEXT_ACCOUNT_NUMBER, &next)?;
        Ok(number)
    }

    pub(crate) fn set_next_account_number(&self, ctx: &mut Context, number: u64) -> Result<(), StoreError> {
        ctx.kv(&self.key).set_value(NEXT_ACCOUNT_NUMBER, &number)
    }

    /// Create and store a fresh account at `addr`.
    pub fn new_account(&self, ctx: &mut Context, addr: &Address) -> Result<BaseAccount, StoreError> {
        let account = BaseAccount::new(*addr, self.next_account_number(ctx)?);
        self.set_account(ctx, &account)?;
        debug!("[Auth] Created account {} (#{})", addr, account.account_number);
        Ok(account)
    }

    /// The account at `addr`, created if it does not exist yet.
    pub fn ensure_account(&self, ctx: &mut Context, addr: &Address) -> Result<BaseAccount, StoreError> {
        match self.get_account(ctx, addr)? {
            Some(account) => Ok(account),
            None => self.new_account(ctx, addr),
        }
    }

    #[must_use]
    pub fn module_address(&self, name: &str) -> Option<Address> {
        self.permissions.address_of(name)
    }

    /// The account of module `name`, created on first use.
    pub fn get_module_account(&self, ctx: &mut Context, name: &str) -> Result<BaseAccount, TxError> {
        let addr = self.module_address(name).ok_or_else(|| {
            TxError::new(
                TxErrorKind::UnknownAddress,
                format!("module account {name} does not exist"),
            )
        })?;
        Ok(self.ensure_account(ctx, &addr)?)
    }
}

impl ante::AccountKeeper for AuthKeeper {
    fn params(&self, ctx: &mut Context) -> Result<AuthParams, TxError> {
        Ok(self.get_params(ctx)?)
    }

    fn get_account(&self, ctx: &mut Context, addr: &Address) -> Result<Option<BaseAccount>, TxError> {
        Ok(AuthKeeper::get_account(self, ctx, addr)?)
    }

    fn set_account(&self, ctx: &mut Context, account: &BaseAccount) -> Result<(), TxError> {
        Ok(AuthKeeper::set_account(self, ctx, account)?)
    }

    fn module_address(&self, name: &str) -> Option<Address> {
        AuthKeeper::module_address(self, name)
    }
}
