//! # Auth
//!
//! Accounts, account numbers, sequences and the chain-wide authentication
//! parameters. Module accounts are ordinary accounts at addresses derived
//! from the permission table.

mod keeper;
mod module;

pub use keeper::AuthKeeper;
pub use module::{descriptor, AuthGenesis, AuthModule};

pub const MODULE_NAME: &str = "auth";
pub const STORE_KEY: &str = "acc";
pub const CONSENSUS_VERSION: u64 = 3;
