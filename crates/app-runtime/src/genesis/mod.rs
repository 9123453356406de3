//! # Genesis
//!
//! Loading and writing genesis documents.

mod document;

pub use document::*;
