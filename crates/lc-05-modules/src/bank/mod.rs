//! # Bank
//!
//! Balances, total supply and transfers. Minting, burning and delegation
//! transfers are gated on the permissions of the module account involved,
//! and blocked module accounts never receive external transfers.

mod keeper;
mod module;
mod types;

pub use keeper::BankKeeper;
pub use module::{descriptor, BankModule};
pub use types::*;

pub const MODULE_NAME: &str = "bank";
pub const STORE_KEY: &str = "bank";
pub const CONSENSUS_VERSION: u64 = 3;
