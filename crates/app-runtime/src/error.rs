//! # Application Errors
//!
//! Every fatal error leaving the composition root falls in exactly one
//! category. `main` maps the category to the process exit status.

use shared_types::{ConfigError, GenesisError, LifecycleError, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The module set, orders, keys or permissions are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The genesis document was rejected or could not be applied.
    #[error("genesis error: {0}")]
    Genesis(#[from] GenesisError),

    /// A lifecycle call failed after the chain started.
    #[error("runtime error: {0}")]
    Runtime(#[from] LifecycleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Genesis,
    Runtime,
}

impl AppError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Genesis(_) => ErrorCategory::Genesis,
            Self::Runtime(_) => ErrorCategory::Runtime,
        }
    }
}

impl ErrorCategory {
    /// Process exit status for this category.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Configuration => 2,
            Self::Genesis => 3,
            Self::Runtime => 4,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Genesis => write!(f, "genesis"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

/// Store failures outside genesis stop the chain.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Runtime(LifecycleError::Store(err))
    }
}
