pub mod cache;
pub mod gas;
pub mod kv;
pub mod multistore;
pub mod store_key;

pub use cache::*;
pub use gas::*;
pub use kv::*;
pub use multistore::*;
pub use store_key::*;
