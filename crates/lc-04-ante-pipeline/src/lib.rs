//! # lc-04-ante-pipeline
//!
//! Transaction admission for Ledger-Compose.
//!
//! ```text
//! raw tx ──→ AnteHandler::process ──→ [link 1] → [link 2] → ... → [link n] ──→ Admit
//!                    │                     │
//!                    │                  Reject ──→ store, events, gas restored
//!                    └─ one revertible layer around the whole chain
//! ```
//!
//! Links reach module state only through the keeper ports in `ports`.

pub mod decorators;
pub mod handler;
pub mod ports;

pub use decorators::*;
pub use handler::*;
pub use ports::*;

#[cfg(test)]
pub(crate) mod testutil;
