//! # App Runtime Library
//!
//! The composition root of Ledger-Compose. `App::build` turns an explicit
//! `AppConfig` into a running application; the binary in `main.rs` drives it
//! with a local block ticker.
//!
//! ## Build Sequence
//!
//! ```text
//! AppConfig
//!    │ mount_stores          keys per namespace, mounted once
//!    │ permission_table      module accounts, reserved + blocked sets
//!    │ Keepers::build        dependency order, immutable afterwards
//!    │ wire_hooks            staking → distribution, slashing
//!    │ build_manager         descriptors + three lifecycle orders
//!    │ wire_invariants       every route handed to crisis
//!    │ build_routers         message + query routes
//!    ▼ build_ante            standard admission chain
//!   App
//! ```
//!
//! Every step returns `ConfigError` on inconsistency. Nothing here exits the
//! process.

pub mod app;
pub mod container;
pub mod driver;
pub mod error;
pub mod genesis;
pub mod wiring;

pub use app::*;
pub use container::{AppConfig, DriverConfig, Keepers, OrderConfig, StoreKeys};
pub use driver::LocalDriver;
pub use error::{AppError, ErrorCategory};
pub use genesis::GenesisDoc;
