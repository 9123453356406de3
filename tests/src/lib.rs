//! # Ledger-Compose Test Suite
//!
//! Cross-crate tests. Unit tests live next to the code in each crate; this
//! crate composes several of them.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs          # signing accounts, tx builders, TestChain
//! └── integration/
//!     ├── recorder.rs      # a module that records its callbacks
//!     ├── lifecycle.rs     # ordering and genesis policy scenarios
//!     ├── admission.rs     # ante pipeline through deliver/check tx
//!     ├── composition.rs   # App::build failures and module interplay
//!     └── properties.rs    # store, permission and order properties
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p lc-tests
//! cargo test -p lc-tests integration::lifecycle::
//! ```

pub mod fixtures;
pub mod integration;
