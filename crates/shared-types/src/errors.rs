//! # Error Types
//!
//! Two disjoint classes:
//!
//! | Class | Types | Handling |
//! |-------|-------|----------|
//! | Fatal composition / lifecycle | `ConfigError`, `GenesisError`, `LifecycleError` | abort startup or halt the node |
//! | Recoverable admission | `TxError` | reject one transaction, keep processing the block |
//!
//! `StoreError` and `ModuleError` are raised below both and converted by the
//! caller into whichever class applies where they occur.

use thiserror::Error;

use crate::entities::LifecyclePhase;

/// Errors raised by the partitioned store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The presented key is not mounted, or is a different key with the same name.
    #[error("Unknown store key: {name}")]
    UnknownStoreKey { name: String },

    /// Gas limit exceeded while accessing the store.
    #[error("Out of gas in {descriptor}: limit {limit}, used {used}")]
    OutOfGas {
        descriptor: String,
        limit: u64,
        used: u64,
    },

    /// A stored value failed to encode or decode.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Layer stack misuse (commit/discard without a pushed layer).
    #[error("Branch error: {0}")]
    Branch(String),

    /// A stored counter cannot advance past `u64::MAX`.
    #[error("Counter overflow: {0}")]
    Overflow(String),
}

/// Construction-time composition bugs. Never caught-and-continued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Duplicate store key '{name}' in {kind} namespace")]
    DuplicateStoreKey { name: String, kind: String },

    #[error("Store key names must not be empty")]
    EmptyStoreKeyName,

    #[error("Store key '{0}' is already mounted")]
    DuplicateMount(String),

    #[error("Module '{0}' registered twice")]
    DuplicateModule(String),

    #[error("Module '{module}' depends on unregistered module '{dependency}'")]
    UnresolvedDependency { module: String, dependency: String },

    #[error("Module '{module}' is registered before its dependency '{dependency}'")]
    ForwardDependency { module: String, dependency: String },

    #[error("{phase} order is missing module '{module}'")]
    OrderMissingModule { phase: LifecyclePhase, module: String },

    #[error("{phase} order names unknown module '{module}'")]
    OrderUnknownModule { phase: LifecyclePhase, module: String },

    #[error("{phase} order lists module '{module}' more than once")]
    OrderDuplicate { phase: LifecyclePhase, module: String },

    #[error("{phase} order lists module '{module}' which does not implement that phase")]
    OrderCapabilityMismatch { phase: LifecyclePhase, module: String },

    #[error("{0} order was never set")]
    OrderNotSet(LifecyclePhase),

    #[error("Message route '{0}' registered twice")]
    DuplicateMsgRoute(String),

    #[error("Query route '{0}' registered twice")]
    DuplicateQueryRoute(String),

    #[error("Unknown module account permission '{0}'")]
    UnknownPermission(String),

    #[error("Allow-listed account '{0}' is not a module account")]
    UnknownAllowListedAccount(String),

    #[error("Module account '{0}' listed more than once")]
    DuplicateModuleAccount(String),

    #[error("Params subspace '{0}' created twice")]
    DuplicateSubspace(String),

    #[error("Hooks for '{0}' already set")]
    HooksAlreadySet(String),

    #[error("Ante handler is missing required keeper '{0}'")]
    MissingKeeper(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Failures while initializing the chain from its genesis document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenesisError {
    #[error("Malformed genesis document: {0}")]
    Decode(String),

    #[error("Genesis state is missing for module '{0}'")]
    MissingModuleState(String),

    #[error("Genesis state provided for unknown or non-genesis module '{0}'")]
    UnexpectedModuleState(String),

    #[error("Invalid genesis state for module '{module}': {reason}")]
    InvalidModuleState { module: String, reason: String },

    #[error("Genesis callback of module '{module}' failed: {reason}")]
    ModuleFailed { module: String, reason: String },

    #[error("Genesis invariant '{route}' broken: {detail}")]
    InvariantBroken { route: String, detail: String },

    #[error("Chain id mismatch: configured '{configured}', genesis '{genesis}'")]
    ChainIdMismatch { configured: String, genesis: String },

    #[error("Lifecycle error during genesis: {0}")]
    Lifecycle(String),

    #[error("Store failure during genesis: {0}")]
    Store(#[from] StoreError),
}

/// Runtime failures of the block lifecycle. Fatal to the node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Lifecycle call '{call}' is invalid in phase {state}")]
    PhaseViolation { call: &'static str, state: String },

    #[error("Module '{module}' failed during {phase}: {reason}")]
    ModuleFailed {
        module: String,
        phase: LifecyclePhase,
        reason: String,
    },

    #[error("Invariant '{route}' broken: {detail}")]
    InvariantBroken { route: String, detail: String },

    #[error("Header mismatch: {0}")]
    HeaderMismatch(String),

    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
}

/// Error returned by a module lifecycle callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Tx(#[from] TxError),
}

/// Categories of recoverable transaction failures, with stable result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxErrorKind {
    Internal,
    TxDecode,
    InvalidSequence,
    Unauthorized,
    InsufficientFunds,
    UnknownRequest,
    InvalidAddress,
    InvalidPubKey,
    UnknownAddress,
    InvalidCoins,
    OutOfGas,
    MemoTooLarge,
    InsufficientFee,
    TooManySignatures,
    NoSignatures,
    InvalidRequest,
    TxTimeoutHeight,
    WrongSequence,
    BlockedAddress,
    FeeGrant,
}

impl TxErrorKind {
    /// Result code reported to the submitter. Zero is reserved for success.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            Self::Internal => 1,
            Self::TxDecode => 2,
            Self::InvalidSequence => 3,
            Self::Unauthorized => 4,
            Self::InsufficientFunds => 5,
            Self::UnknownRequest => 6,
            Self::InvalidAddress => 7,
            Self::InvalidPubKey => 8,
            Self::UnknownAddress => 9,
            Self::InvalidCoins => 10,
            Self::OutOfGas => 11,
            Self::MemoTooLarge => 12,
            Self::InsufficientFee => 13,
            Self::TooManySignatures => 14,
            Self::NoSignatures => 15,
            Self::InvalidRequest => 18,
            Self::TxTimeoutHeight => 30,
            Self::WrongSequence => 32,
            Self::BlockedAddress => 40,
            Self::FeeGrant => 41,
        }
    }
}

impl std::fmt::Display for TxErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// A structured, recoverable transaction rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct TxError {
    pub kind: TxErrorKind,
    pub detail: String,
}

impl TxError {
    pub fn new(kind: TxErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> u32 {
        self.kind.code()
    }
}

impl From<StoreError> for TxError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfGas { .. } => TxError::new(TxErrorKind::OutOfGas, err.to_string()),
            other => TxError::new(TxErrorKind::Internal, other.to_string()),
        }
    }
}
