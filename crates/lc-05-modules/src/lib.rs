//! # lc-05-modules
//!
//! The reference module set composed by the application.
//!
//! ## Keeper Graph
//!
//! ```text
//! params ← auth ← bank ← staking ← mint
//!                   ↑       ↑   ↖
//!                   │       │    distribution
//!                   │       └─── slashing
//!                   ├── crisis
//!                   └── feegrant (auth only)
//! ```
//!
//! Arrows point at the keeper a module needs. Keepers are built in that order
//! and are immutable afterwards. Back edges (staking notifying distribution
//! and slashing, crisis running every module's invariants) are installed in a
//! separate wiring pass through set-once slots.
//!
//! ## Isolation
//!
//! Every keeper holds the one `StoreKey` of its own partition and reaches
//! other modules' state only through their keepers.

pub mod auth;
pub mod bank;
pub mod crisis;
pub mod distribution;
pub mod feegrant;
pub mod mint;
pub mod params;
pub mod slashing;
pub mod staking;

#[cfg(test)]
pub(crate) mod testutil;

pub use auth::AuthKeeper;
pub use bank::BankKeeper;
pub use crisis::CrisisKeeper;
pub use distribution::DistrKeeper;
pub use feegrant::FeegrantKeeper;
pub use mint::MintKeeper;
pub use slashing::SlashingKeeper;
pub use staking::{MultiStakingHooks, StakingHooks, StakingKeeper};

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Address, ModuleError, Msg, TxError, TxErrorKind};

/// Module account receiving transaction fees and block provisions.
pub const FEE_COLLECTOR: &str = "fee_collector";
/// Module account holding staked tokens of bonded validators.
pub const BONDED_POOL: &str = "bonded_tokens_pool";
/// Module account holding staked tokens of unbonded validators.
pub const NOT_BONDED_POOL: &str = "not_bonded_tokens_pool";

/// Denominator of every `*_bps` rate.
pub const BPS: u128 = 10_000;

pub(crate) fn decode_state<T: DeserializeOwned>(state: &serde_json::Value) -> Result<T, ModuleError> {
    serde_json::from_value(state.clone()).map_err(|e| ModuleError::Codec(e.to_string()))
}

pub(crate) fn encode_state<T: Serialize>(state: &T) -> Result<serde_json::Value, ModuleError> {
    serde_json::to_value(state).map_err(|e| ModuleError::Codec(e.to_string()))
}

/// Default genesis payloads are built from `Default` impls and always encode.
pub(crate) fn default_state<T: Serialize + Default>() -> serde_json::Value {
    serde_json::to_value(T::default()).unwrap_or(serde_json::Value::Null)
}

pub(crate) fn decode_query<T: DeserializeOwned>(data: &[u8]) -> Result<T, TxError> {
    serde_json::from_slice(data)
        .map_err(|e| TxError::new(TxErrorKind::TxDecode, format!("malformed query: {e}")))
}

pub(crate) fn encode_response<T: Serialize>(value: &T) -> Result<Vec<u8>, TxError> {
    serde_json::to_vec(value).map_err(|e| TxError::new(TxErrorKind::Internal, e.to_string()))
}

pub(crate) fn unknown_query(module: &str, path: &str) -> TxError {
    TxError::new(
        TxErrorKind::UnknownRequest,
        format!("unknown {module} query endpoint: {path}"),
    )
}

/// The message must name `addr` among its signers.
pub(crate) fn ensure_signer(msg: &Msg, addr: &Address) -> Result<(), TxError> {
    if msg.signers.contains(addr) {
        Ok(())
    } else {
        Err(TxError::new(
            TxErrorKind::Unauthorized,
            format!("{} must be signed by {addr}", msg.type_url),
        ))
    }
}

/// `amount * bps / BPS`, rounded down.
pub(crate) fn mul_bps(amount: u128, bps: u64) -> u128 {
    amount.saturating_mul(u128::from(bps)) / BPS
}

/// Request body of every single-address query.
#[derive(Debug, serde::Deserialize, Serialize)]
pub struct AddressQuery {
    pub address: Address,
}
