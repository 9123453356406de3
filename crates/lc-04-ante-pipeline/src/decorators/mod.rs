//! The standard decorators, grouped by concern.

pub mod basic;
pub mod fee;
pub mod setup;
pub mod sigverify;

pub use basic::*;
pub use fee::*;
pub use setup::*;
pub use sigverify::*;
