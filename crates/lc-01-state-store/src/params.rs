//! # Params Subspaces
//!
//! Chain-wide parameters live in the reserved `params` partition, one
//! subspace per module. Values are JSON so they stay readable in exported
//! genesis. Every write is also flagged in `transient_params` so callers can
//! tell whether a parameter changed during the current block.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{ConfigError, StoreError};
use tracing::debug;

use crate::context::Context;
use crate::domain::StoreKey;

/// Creates and tracks subspaces. Each module name may own one subspace.
#[derive(Debug)]
pub struct ParamsKeeper {
    key: StoreKey,
    tkey: StoreKey,
    subspaces: BTreeMap<String, Subspace>,
}

impl ParamsKeeper {
    pub fn new(key: StoreKey, tkey: StoreKey) -> Self {
        Self {
            key,
            tkey,
            subspaces: BTreeMap::new(),
        }
    }

    /// Create the subspace for `name`. Creating it twice is a configuration error.
    pub fn subspace(&mut self, name: &str) -> Result<Subspace, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::Invalid("params subspace name is empty".into()));
        }
        if self.subspaces.contains_key(name) {
            return Err(ConfigError::DuplicateSubspace(name.to_string()));
        }
        let subspace = Subspace {
            name: name.to_string(),
            key: self.key.clone(),
            tkey: self.tkey.clone(),
        };
        self.subspaces.insert(name.to_string(), subspace.clone());
        debug!("[Store] Created params subspace '{}'", name);
        Ok(subspace)
    }

    #[must_use]
    pub fn get_subspace(&self, name: &str) -> Option<Subspace> {
        self.subspaces.get(name).cloned()
    }

    #[must_use]
    pub fn subspace_names(&self) -> Vec<&str> {
        self.subspaces.keys().map(String::as_str).collect()
    }
}

/// A module's slice of the params partition.
#[derive(Debug, Clone)]
pub struct Subspace {
    name: String,
    key: StoreKey,
    tkey: StoreKey,
}

impl Subspace {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn prefix(&self) -> Vec<u8> {
        format!("{}/", self.name).into_bytes()
    }

    pub fn get<T: DeserializeOwned>(&self, ctx: &mut Context, param: &str) -> Result<Option<T>, StoreError> {
        let prefix = self.prefix();
        match ctx.kv(&self.key).prefixed(&prefix).get(param.as_bytes())? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Codec(format!("param {}/{}: {}", self.name, param, e))),
            None => Ok(None),
        }
    }

    /// Like `get`, falling back to `T::default()` when unset.
    pub fn get_or_default<T: DeserializeOwned + Default>(
        &self,
        ctx: &mut Context,
        param: &str,
    ) -> Result<T, StoreError> {
        Ok(self.get(ctx, param)?.unwrap_or_default())
    }

    pub fn set<T: Serialize>(&self, ctx: &mut Context, param: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Codec(e.to_string()))?;
        let prefix = self.prefix();
        ctx.kv(&self.key).prefixed(&prefix).set(param.as_bytes(), bytes)?;
        ctx.kv(&self.tkey)
            .prefixed(&prefix)
            .set(param.as_bytes(), vec![1])
    }

    /// True if `param` was written since the last commit.
    pub fn modified(&self, ctx: &mut Context, param: &str) -> Result<bool, StoreError> {
        let prefix = self.prefix();
        ctx.kv(&self.tkey).prefixed(&prefix).has(param.as_bytes())
    }

    /// Every parameter of the subspace as raw JSON, in name order.
    pub fn get_all(&self, ctx: &mut Context) -> Result<BTreeMap<String, serde_json::Value>, StoreError> {
        let prefix = self.prefix();
        let mut out = BTreeMap::new();
        for (k, v) in ctx.kv(&self.key).prefixed(&prefix).iter_prefix(b"")? {
            let name = String::from_utf8_lossy(&k).into_owned();
            let value = serde_json::from_slice(&v).map_err(|e| StoreError::Codec(e.to_string()))?;
            out.insert(name, value);
        }
        Ok(out)
    }
}
