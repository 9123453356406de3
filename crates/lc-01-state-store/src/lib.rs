//! # lc-01-state-store
//!
//! Partitioned key/value state for Ledger-Compose.
//!
//! ## Role in System
//!
//! - **Namespace Registry**: hands out identity-unique `StoreKey`s per kind
//!   (persistent, transient, memory)
//! - **Commit Store**: holds the committed partitions and computes the app hash
//! - **Branches**: every block, transaction and ante run works on a
//!   `CacheMultiStore` whose write layers can be committed or discarded
//!
//! ```text
//! StoreKeyRegistry ──keys──→ CommitMultiStore ──snapshot──→ CacheMultiStore
//!                                   ↑                            │
//!                                   └──────── write set ─────────┘
//!                                              (commit)
//! ```
//!
//! Modules never see the commit store. They receive a `Context` and reach a
//! partition only by presenting the exact `StoreKey` they were built with.

pub mod context;
pub mod domain;
pub mod params;

pub use context::*;
pub use domain::*;
pub use params::*;
