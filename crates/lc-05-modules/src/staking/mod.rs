//! # Staking
//!
//! Validators, delegations and the bonded set. End-block turns changes in
//! the bonded set into consensus validator updates. Distribution and
//! slashing observe validator changes through `StakingHooks`, installed once
//! after every keeper exists.

mod hooks;
mod keeper;
mod module;
mod types;

pub use hooks::{MultiStakingHooks, StakingHooks};
pub use keeper::StakingKeeper;
pub use module::{descriptor, StakingModule};
pub use types::*;

pub const MODULE_NAME: &str = "staking";
pub const STORE_KEY: &str = "staking";
pub const CONSENSUS_VERSION: u64 = 3;
