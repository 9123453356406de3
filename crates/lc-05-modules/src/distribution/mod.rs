//! # Distribution
//!
//! At the start of every block the fees collected during the previous block
//! move to the distribution module account. A community tax goes to the
//! community pool; the rest is split between the previous block's voters in
//! proportion to their power. Operators withdraw their accumulated rewards
//! with a message.

mod keeper;
mod module;
mod types;

pub use keeper::{DistrHooks, DistrKeeper};
pub use module::{descriptor, DistrModule};
pub use types::*;

pub const MODULE_NAME: &str = "distribution";
pub const STORE_KEY: &str = "distribution";
pub const CONSENSUS_VERSION: u64 = 3;
