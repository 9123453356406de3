//! # Keeper Ports
//!
//! The only coupling between ante links and module internals. The auth,
//! bank and feegrant keepers implement these; tests use in-memory doubles.

use lc_01_state_store::Context;
use shared_types::{Address, AuthParams, BaseAccount, Coins, Msg, TxError};

pub trait AccountKeeper: Send + Sync {
    fn params(&self, ctx: &mut Context) -> Result<AuthParams, TxError>;

    fn get_account(&self, ctx: &mut Context, addr: &Address) -> Result<Option<BaseAccount>, TxError>;

    fn set_account(&self, ctx: &mut Context, account: &BaseAccount) -> Result<(), TxError>;

    /// Address of a module account, if `name` is one.
    fn module_address(&self, name: &str) -> Option<Address>;
}

pub trait BankKeeper: Send + Sync {
    fn send_coins_from_account_to_module(
        &self,
        ctx: &mut Context,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), TxError>;
}

pub trait FeegrantKeeper: Send + Sync {
    /// Charge `fee` against the allowance `granter` gave `grantee`.
    fn use_granted_fees(
        &self,
        ctx: &mut Context,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        msgs: &[Msg],
    ) -> Result<(), TxError>;
}
