//! # lc-02-module-accounts
//!
//! Module accounts are accounts owned by a module rather than a key pair.
//! Their address is a pure function of the module account name, and the
//! permissions they hold (mint, burn, stake) are fixed at composition time.
//!
//! ## Security
//!
//! - Addresses are the first 20 bytes of SHA-256 over the name, so distinct
//!   names never share an address and every replica derives the same bytes
//! - Every module account is blocked from receiving external transfers unless
//!   allow-listed
//! - Only `BTreeMap`/`BTreeSet` are used so iteration order is identical on
//!   every replica

pub mod permission;
pub mod table;

pub use permission::*;
pub use table::*;
