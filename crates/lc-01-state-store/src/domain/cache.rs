//! # Cache Multi-Store (Revertible Branch)
//!
//! A branch over an immutable snapshot with a stack of write layers.
//!
//! ```text
//! layer n   ← writes land here (push_layer opens a new one)
//! ...
//! layer 0   ← the branch's own layer, becomes the commit write set
//! snapshot  ← committed state, never mutated by a branch
//! ```
//!
//! Reads fall through from the top layer to the snapshot. `commit_layer`
//! merges the top layer into the one below; `discard_layer` drops it.

use std::collections::BTreeMap;
use std::sync::Arc;

use shared_types::StoreError;

use super::multistore::{Snapshot, WriteSet};
use super::store_key::StoreKey;

#[derive(Debug, Clone)]
pub struct CacheMultiStore {
    base: Arc<Snapshot>,
    layers: Vec<WriteSet>,
}

impl CacheMultiStore {
    pub fn new(base: Arc<Snapshot>) -> Self {
        Self {
            base,
            layers: vec![WriteSet::new()],
        }
    }

    /// Current value of `k`, honouring uncommitted layers.
    pub fn get(&self, key: &StoreKey, k: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let partition = self.base.resolve(key)?;
        let id = key.mount_id();
        for layer in self.layers.iter().rev() {
            if let Some(v) = layer.get(&id).and_then(|w| w.get(k)) {
                return Ok(v.clone());
            }
        }
        Ok(partition.data.get(k).cloned())
    }

    pub fn set(&mut self, key: &StoreKey, k: Vec<u8>, v: Vec<u8>) -> Result<(), StoreError> {
        self.write(key, k, Some(v))
    }

    pub fn delete(&mut self, key: &StoreKey, k: &[u8]) -> Result<(), StoreError> {
        self.write(key, k.to_vec(), None)
    }

    fn write(&mut self, key: &StoreKey, k: Vec<u8>, v: Option<Vec<u8>>) -> Result<(), StoreError> {
        self.base.resolve(key)?;
        let top = self
            .layers
            .last_mut()
            .ok_or_else(|| StoreError::Branch("branch has no layer".into()))?;
        top.entry(key.mount_id()).or_default().insert(k, v);
        Ok(())
    }

    /// All live entries whose key starts with `prefix`, in ascending key order.
    pub fn iter_prefix(
        &self,
        key: &StoreKey,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let partition = self.base.resolve(key)?;
        let id = key.mount_id();

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = partition
            .data
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for layer in &self.layers {
            let Some(writes) = layer.get(&id) else {
                continue;
            };
            for (k, v) in writes
                .range(prefix.to_vec()..)
                .take_while(|(k, _)| k.starts_with(prefix))
            {
                match v {
                    Some(v) => {
                        merged.insert(k.clone(), v.clone());
                    }
                    None => {
                        merged.remove(k);
                    }
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    /// Open a nested revertible layer.
    pub fn push_layer(&mut self) {
        self.layers.push(WriteSet::new());
    }

    /// Merge the top layer into its parent.
    pub fn commit_layer(&mut self) -> Result<(), StoreError> {
        if self.layers.len() < 2 {
            return Err(StoreError::Branch("commit_layer without push_layer".into()));
        }
        let top = self.layers.pop().unwrap_or_default();
        if let Some(parent) = self.layers.last_mut() {
            for (id, writes) in top {
                parent.entry(id).or_default().extend(writes);
            }
        }
        Ok(())
    }

    /// Drop the top layer and everything written to it.
    pub fn discard_layer(&mut self) -> Result<(), StoreError> {
        if self.layers.len() < 2 {
            return Err(StoreError::Branch("discard_layer without push_layer".into()));
        }
        self.layers.pop();
        Ok(())
    }

    /// Number of open layers, including the branch's own.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Version of the snapshot this branch was opened on.
    #[must_use]
    pub fn base_version(&self) -> u64 {
        self.base.version()
    }

    /// True if nothing has been written to the branch.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.layers.iter().all(|l| l.values().all(BTreeMap::is_empty))
    }

    /// Consume the branch and return its writes for `CommitMultiStore::commit`.
    /// All nested layers must have been closed.
    pub fn into_write_set(mut self) -> Result<WriteSet, StoreError> {
        if self.layers.len() != 1 {
            return Err(StoreError::Branch(format!(
                "{} nested layer(s) still open",
                self.layers.len() - 1
            )));
        }
        Ok(self.layers.pop().unwrap_or_default())
    }
}
