//! # Genesis Document
//!
//! The JSON file a chain starts from: chain id, genesis time and the
//! application state keyed by module name.

use std::path::Path;

use lc_03_module_manager::GenesisState;
use serde::{Deserialize, Serialize};
use shared_types::GenesisError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    /// Unix seconds.
    #[serde(default)]
    pub genesis_time: u64,
    pub app_state: GenesisState,
}

impl GenesisDoc {
    pub fn new(chain_id: impl Into<String>, genesis_time: u64, app_state: GenesisState) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_time,
            app_state,
        }
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, GenesisError> {
        serde_json::from_slice(raw).map_err(|e| GenesisError::Decode(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, GenesisError> {
        let raw = std::fs::read(path)
            .map_err(|e| GenesisError::Decode(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn save(&self, path: &Path) -> Result<(), GenesisError> {
        let raw = serde_json::to_vec_pretty(self).map_err(|e| GenesisError::Decode(e.to_string()))?;
        std::fs::write(path, raw)
            .map_err(|e| GenesisError::Decode(format!("{}: {e}", path.display())))
    }

    /// Bytes handed to `init_chain` as the application state.
    pub fn app_state_bytes(&self) -> Result<Vec<u8>, GenesisError> {
        serde_json::to_vec(&self.app_state).map_err(|e| GenesisError::Decode(e.to_string()))
    }
}

/// Decode the application state part of a genesis document.
pub fn decode_app_state(raw: &[u8]) -> Result<GenesisState, GenesisError> {
    serde_json::from_slice(raw).map_err(|e| GenesisError::Decode(e.to_string()))
}
