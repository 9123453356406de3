//! # Shared Types Crate
//!
//! Domain entities and the error taxonomy shared by every Ledger-Compose crate.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a crate boundary lives here.
//! - **Deterministic Encoding**: only ordered collections (`Vec`, `BTreeMap`) appear in
//!   types that are hashed, signed or stored.
//! - **Two Error Classes**: fatal composition/lifecycle errors are kept disjoint from
//!   recoverable per-transaction rejections (see [`errors`]).

pub mod coins;
pub mod entities;
pub mod errors;
pub mod tx;

pub use coins::{Coin, Coins};
pub use entities::*;
pub use errors::*;
pub use tx::*;
