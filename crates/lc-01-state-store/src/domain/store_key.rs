//! # Storage Namespace Registry
//!
//! A `StoreKey` is a capability: holding it is the only way to reach a
//! partition. Two keys are equal only if they are the same allocation, so a
//! key forged with an equal name is still rejected by the store.
//!
//! Names are unique per kind. `"params"` (persistent) and `"params"`
//! (transient) are distinct keys.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use shared_types::ConfigError;
use tracing::debug;

/// The lifetime class of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StoreKind {
    /// Committed and included in the app hash.
    Persistent,
    /// Discarded at every commit.
    Transient,
    /// Kept in process memory across blocks, excluded from the app hash.
    Memory,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => write!(f, "persistent"),
            Self::Transient => write!(f, "transient"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Location of a mounted partition. Unique because names are unique per kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MountId {
    pub kind: StoreKind,
    pub name: String,
}

#[derive(Debug)]
struct KeyInner {
    name: String,
    kind: StoreKind,
    seq: u64,
}

/// Opaque, identity-compared handle to one partition.
#[derive(Clone)]
pub struct StoreKey(Arc<KeyInner>);

impl StoreKey {
    fn new(name: &str, kind: StoreKind, seq: u64) -> Self {
        Self(Arc::new(KeyInner {
            name: name.to_string(),
            kind,
            seq,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn kind(&self) -> StoreKind {
        self.0.kind
    }

    #[must_use]
    pub fn mount_id(&self) -> MountId {
        MountId {
            kind: self.0.kind,
            name: self.0.name.clone(),
        }
    }
}

impl PartialEq for StoreKey {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for StoreKey {}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreKey")
            .field("name", &self.0.name)
            .field("kind", &self.0.kind)
            .field("seq", &self.0.seq)
            .finish()
    }
}

/// Allocates store keys. One registry per application instance.
#[derive(Debug, Default)]
pub struct StoreKeyRegistry {
    next_seq: u64,
    namespaces: BTreeMap<StoreKind, BTreeMap<String, StoreKey>>,
}

impl StoreKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate persistent keys.
    pub fn allocate_kv(&mut self, names: &[&str]) -> Result<BTreeMap<String, StoreKey>, ConfigError> {
        self.allocate(StoreKind::Persistent, names)
    }

    /// Allocate transient keys.
    pub fn allocate_transient(
        &mut self,
        names: &[&str],
    ) -> Result<BTreeMap<String, StoreKey>, ConfigError> {
        self.allocate(StoreKind::Transient, names)
    }

    /// Allocate in-memory keys.
    pub fn allocate_memory(
        &mut self,
        names: &[&str],
    ) -> Result<BTreeMap<String, StoreKey>, ConfigError> {
        self.allocate(StoreKind::Memory, names)
    }

    /// All-or-nothing: every name is checked before any key is created.
    fn allocate(
        &mut self,
        kind: StoreKind,
        names: &[&str],
    ) -> Result<BTreeMap<String, StoreKey>, ConfigError> {
        let existing = self.namespaces.entry(kind).or_default();
        let mut seen = BTreeSet::new();
        for name in names {
            if name.is_empty() {
                return Err(ConfigError::EmptyStoreKeyName);
            }
            if !seen.insert(*name) || existing.contains_key(*name) {
                return Err(ConfigError::DuplicateStoreKey {
                    name: (*name).to_string(),
                    kind: kind.to_string(),
                });
            }
        }

        let mut out = BTreeMap::new();
        for name in names {
            let key = StoreKey::new(name, kind, self.next_seq);
            self.next_seq += 1;
            existing.insert((*name).to_string(), key.clone());
            out.insert((*name).to_string(), key);
        }
        debug!("[Store] Allocated {} {} key(s)", out.len(), kind);
        Ok(out)
    }

    /// Look up a previously allocated key.
    #[must_use]
    pub fn get(&self, kind: StoreKind, name: &str) -> Option<&StoreKey> {
        self.namespaces.get(&kind).and_then(|ns| ns.get(name))
    }

    /// Every allocated key, ordered by kind then name.
    #[must_use]
    pub fn all_keys(&self) -> Vec<StoreKey> {
        self.namespaces
            .values()
            .flat_map(|ns| ns.values().cloned())
            .collect()
    }
}
