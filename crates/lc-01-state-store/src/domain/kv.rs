//! Gas-metered view over one partition of a branch.
//!
//! Obtained from `Context::kv`. A view may carry a key prefix, in which case
//! every key is transparently prefixed on the way in and stripped on the way
//! out of `iter_prefix`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::StoreError;

use super::cache::CacheMultiStore;
use super::gas::{GasMeter, KvGasConfig};
use super::store_key::StoreKey;

pub struct KvStore<'a> {
    store: &'a mut CacheMultiStore,
    key: &'a StoreKey,
    gas: &'a mut GasMeter,
    config: KvGasConfig,
    prefix: Vec<u8>,
}

impl<'a> KvStore<'a> {
    pub fn new(store: &'a mut CacheMultiStore, key: &'a StoreKey, gas: &'a mut GasMeter) -> Self {
        Self {
            store,
            key,
            gas,
            config: KvGasConfig::for_kind(key.kind()),
            prefix: Vec::new(),
        }
    }

    /// Narrow the view to keys under `prefix`.
    #[must_use]
    pub fn prefixed(mut self, prefix: &[u8]) -> Self {
        self.prefix.extend_from_slice(prefix);
        self
    }

    fn full_key(&self, k: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + k.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(k);
        out
    }

    pub fn get(&mut self, k: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.gas.consume(self.config.read_cost_flat, "ReadFlat")?;
        let value = self.store.get(self.key, &self.full_key(k))?;
        if let Some(v) = &value {
            self.gas
                .consume(self.config.read_cost_per_byte * v.len() as u64, "ReadPerByte")?;
        }
        Ok(value)
    }

    pub fn has(&mut self, k: &[u8]) -> Result<bool, StoreError> {
        self.gas.consume(self.config.has_cost, "Has")?;
        Ok(self.store.get(self.key, &self.full_key(k))?.is_some())
    }

    pub fn set(&mut self, k: &[u8], v: Vec<u8>) -> Result<(), StoreError> {
        self.gas.consume(self.config.write_cost_flat, "WriteFlat")?;
        let bytes = (k.len() + v.len()) as u64;
        self.gas
            .consume(self.config.write_cost_per_byte * bytes, "WritePerByte")?;
        let full = self.full_key(k);
        self.store.set(self.key, full, v)
    }

    pub fn delete(&mut self, k: &[u8]) -> Result<(), StoreError> {
        self.gas.consume(self.config.delete_cost, "Delete")?;
        let full = self.full_key(k);
        self.store.delete(self.key, &full)
    }

    /// Entries under `prefix` (relative to the view), keys returned relative
    /// to the view.
    pub fn iter_prefix(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let full = self.full_key(prefix);
        let entries = self.store.iter_prefix(self.key, &full)?;
        let strip = self.prefix.len();
        let mut out = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            self.gas.consume(self.config.iter_next_cost_flat, "IterNext")?;
            self.gas.consume(
                self.config.read_cost_per_byte * (k.len() + v.len()) as u64,
                "ValuePerByte",
            )?;
            out.push((k[strip..].to_vec(), v));
        }
        Ok(out)
    }

    /// Read and decode a bincode value.
    pub fn get_value<T: DeserializeOwned>(&mut self, k: &[u8]) -> Result<Option<T>, StoreError> {
        match self.get(k)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Codec(e.to_string())),
            None => Ok(None),
        }
    }

    /// Encode with bincode and write.
    pub fn set_value<T: Serialize>(&mut self, k: &[u8], value: &T) -> Result<(), StoreError> {
        let bytes = bincode::serialize(value).map_err(|e| StoreError::Codec(e.to_string()))?;
        self.set(k, bytes)
    }

    /// Decode every value under `prefix`.
    pub fn values<T: DeserializeOwned>(&mut self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, T)>, StoreError> {
        self.iter_prefix(prefix)?
            .into_iter()
            .map(|(k, v)| {
                bincode::deserialize(&v)
                    .map(|t| (k, t))
                    .map_err(|e| StoreError::Codec(e.to_string()))
            })
            .collect()
    }
}
