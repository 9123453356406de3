//! # lc-03-module-manager
//!
//! Owns the module set and the schedule it runs on.
//!
//! ## Lifecycle
//!
//! ```text
//! Constructed ──run_genesis──→ GenesisRun ──run_begin_block──→ InBlock
//!                                                  ↑              │
//!                                                  │        run_end_block
//!                                                  │              ↓
//!                                                  └──────── BlockEnded
//! ```
//!
//! Any lifecycle callback failure moves the manager to `Halted`; every later
//! call is a phase violation.
//!
//! ## Ordering
//!
//! Each phase has an explicit total order. An order must name exactly the
//! modules that declared the phase's capability, each once. Nothing is
//! inferred from dependencies.

pub mod capabilities;
pub mod invariants;
pub mod manager;
pub mod module;
pub mod services;

pub use capabilities::*;
pub use invariants::*;
pub use manager::*;
pub use module::*;
pub use services::*;
