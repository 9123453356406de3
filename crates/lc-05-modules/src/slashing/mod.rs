//! # Slashing
//!
//! Liveness tracking over a sliding window of blocks. A bonded validator
//! that misses too many blocks in the window is slashed and jailed; after
//! the jail period its operator may unjail it.

mod keeper;
mod module;
mod types;

pub use keeper::{SlashingHooks, SlashingKeeper};
pub use module::{descriptor, SlashingModule};
pub use types::*;

pub const MODULE_NAME: &str = "slashing";
pub const STORE_KEY: &str = "slashing";
pub const CONSENSUS_VERSION: u64 = 2;
