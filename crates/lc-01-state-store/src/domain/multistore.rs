//! # Commit Multi-Store
//!
//! Holds the committed contents of every mounted partition behind `Arc`s so a
//! snapshot for a new branch costs one pointer copy per partition.
//!
//! ## App Hash
//!
//! ```text
//! leaf(partition) = keccak256( Σ len(k) ‖ k ‖ len(v) ‖ v )   in key order
//! root            = keccak256( Σ len(name) ‖ name ‖ leaf )   persistent partitions, name order
//! ```
//!
//! Transient partitions are emptied at every commit. Memory partitions keep
//! their contents but never contribute to the root.

use std::collections::BTreeMap;
use std::sync::Arc;

use sha3::{Digest, Keccak256};
use shared_types::{ConfigError, Hash, StoreError};
use tracing::{debug, info};

use super::cache::CacheMultiStore;
use super::store_key::{MountId, StoreKey, StoreKind};

/// Committed key/value contents of one partition.
pub type PartitionData = BTreeMap<Vec<u8>, Vec<u8>>;

/// Pending writes keyed by partition. `None` deletes the key.
pub type WriteSet = BTreeMap<MountId, BTreeMap<Vec<u8>, Option<Vec<u8>>>>;

#[derive(Debug, Clone)]
pub(crate) struct Partition {
    pub(crate) key: StoreKey,
    pub(crate) data: Arc<PartitionData>,
}

/// Immutable view of the committed state at one version.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    partitions: BTreeMap<MountId, Partition>,
    version: u64,
}

impl Snapshot {
    /// Resolve a key to its partition, rejecting keys that are not the
    /// mounted allocation.
    pub(crate) fn resolve(&self, key: &StoreKey) -> Result<&Partition, StoreError> {
        match self.partitions.get(&key.mount_id()) {
            Some(p) if p.key == *key => Ok(p),
            _ => Err(StoreError::UnknownStoreKey {
                name: key.name().to_string(),
            }),
        }
    }

    /// Committed value of `k` in the partition of `key`.
    pub fn get(&self, key: &StoreKey, k: &[u8]) -> Result<Option<&Vec<u8>>, StoreError> {
        Ok(self.resolve(key)?.data.get(k))
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn is_mounted(&self, key: &StoreKey) -> bool {
        self.resolve(key).is_ok()
    }
}

/// Result of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub version: u64,
    pub root: Hash,
}

/// The root store. Owned by the application; modules only see branches.
#[derive(Debug)]
pub struct CommitMultiStore {
    snapshot: Arc<Snapshot>,
    last_root: Hash,
}

impl Default for CommitMultiStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitMultiStore {
    pub fn new() -> Self {
        let snapshot = Snapshot::default();
        let last_root = compute_root(&snapshot);
        Self {
            snapshot: Arc::new(snapshot),
            last_root,
        }
    }

    /// Mount a partition. Mounting the same key twice, or a different key whose
    /// (kind, name) is already mounted, is a configuration error.
    pub fn mount(&mut self, key: &StoreKey) -> Result<(), ConfigError> {
        let id = key.mount_id();
        let snapshot = Arc::make_mut(&mut self.snapshot);
        if snapshot.partitions.contains_key(&id) {
            return Err(ConfigError::DuplicateMount(key.name().to_string()));
        }
        snapshot.partitions.insert(
            id,
            Partition {
                key: key.clone(),
                data: Arc::new(PartitionData::new()),
            },
        );
        debug!("[Store] Mounted {} partition '{}'", key.kind(), key.name());
        Ok(())
    }

    pub fn mount_all<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a StoreKey>,
    ) -> Result<(), ConfigError> {
        for key in keys {
            self.mount(key)?;
        }
        self.last_root = compute_root(&self.snapshot);
        Ok(())
    }

    #[must_use]
    pub fn is_mounted(&self, key: &StoreKey) -> bool {
        self.snapshot.is_mounted(key)
    }

    /// The current committed state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Open a fresh branch over the committed state.
    #[must_use]
    pub fn branch(&self) -> CacheMultiStore {
        CacheMultiStore::new(self.snapshot())
    }

    /// Apply a write set and advance the version.
    ///
    /// Every partition named in `writes` is checked before anything is
    /// applied, so an unknown partition leaves the store untouched.
    pub fn commit(&mut self, writes: WriteSet) -> Result<CommitInfo, StoreError> {
        if let Some(unknown) = writes
            .keys()
            .find(|id| !self.snapshot.partitions.contains_key(*id))
        {
            return Err(StoreError::UnknownStoreKey {
                name: unknown.name.clone(),
            });
        }

        let snapshot = Arc::make_mut(&mut self.snapshot);
        let mut applied = 0usize;
        for (id, entries) in writes {
            if id.kind == StoreKind::Transient {
                continue;
            }
            let Some(partition) = snapshot.partitions.get_mut(&id) else {
                continue;
            };
            let data = Arc::make_mut(&mut partition.data);
            for (k, v) in entries {
                applied += 1;
                match v {
                    Some(v) => {
                        data.insert(k, v);
                    }
                    None => {
                        data.remove(&k);
                    }
                }
            }
        }
        for partition in snapshot.partitions.values_mut() {
            if partition.key.kind() == StoreKind::Transient && !partition.data.is_empty() {
                partition.data = Arc::new(PartitionData::new());
            }
        }
        snapshot.version += 1;

        self.last_root = compute_root(snapshot);
        info!(
            "[Store] Committed version {} ({} writes), root {}",
            snapshot.version,
            applied,
            short_hex(&self.last_root)
        );
        Ok(self.last_commit())
    }

    #[must_use]
    pub fn last_commit(&self) -> CommitInfo {
        CommitInfo {
            version: self.snapshot.version,
            root: self.last_root,
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot.version
    }
}

fn compute_root(snapshot: &Snapshot) -> Hash {
    let mut outer = Keccak256::new();
    for (id, partition) in &snapshot.partitions {
        if id.kind != StoreKind::Persistent {
            continue;
        }
        let mut leaf = Keccak256::new();
        for (k, v) in partition.data.iter() {
            leaf.update((k.len() as u64).to_be_bytes());
            leaf.update(k);
            leaf.update((v.len() as u64).to_be_bytes());
            leaf.update(v);
        }
        outer.update((id.name.len() as u64).to_be_bytes());
        outer.update(id.name.as_bytes());
        outer.update(leaf.finalize());
    }
    outer.finalize().into()
}

fn short_hex(hash: &Hash) -> String {
    hash[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::store_key::StoreKeyRegistry;

    fn setup() -> (CommitMultiStore, BTreeMap<String, StoreKey>) {
        let mut reg = StoreKeyRegistry::new();
        let mut keys = reg.allocate_kv(&["acc", "bank"]).unwrap();
        keys.extend(
            reg.allocate_transient(&["tparams"])
                .unwrap()
                .into_iter(),
        );
        keys.extend(reg.allocate_memory(&["mem"]).unwrap().into_iter());
        let mut cms = CommitMultiStore::new();
        cms.mount_all(keys.values()).unwrap();
        (cms, keys)
    }

    fn write(id: MountId, k: &[u8], v: &[u8]) -> WriteSet {
        let mut ws = WriteSet::new();
        ws.entry(id).or_default().insert(k.to_vec(), Some(v.to_vec()));
        ws
    }

    #[test]
    fn test_double_mount_rejected() {
        let (mut cms, keys) = setup();
        assert!(matches!(
            cms.mount(&keys["bank"]),
            Err(ConfigError::DuplicateMount(_))
        ));
    }

    #[test]
    fn test_same_name_foreign_key_rejected() {
        let (cms, _) = setup();
        let foreign = StoreKeyRegistry::new().allocate_kv(&["bank"]).unwrap();
        let snap = cms.snapshot();
        assert_eq!(
            snap.get(&foreign["bank"], b"k"),
            Err(StoreError::UnknownStoreKey {
                name: "bank".into()
            })
        );
    }

    #[test]
    fn test_commit_advances_version_and_changes_root() {
        let (mut cms, keys) = setup();
        let before = cms.last_commit();
        let info = cms.commit(write(keys["bank"].mount_id(), b"k", b"v")).unwrap();
        assert_eq!(info.version, before.version + 1);
        assert_ne!(info.root, before.root);
        assert_eq!(
            cms.snapshot().get(&keys["bank"], b"k").unwrap(),
            Some(&b"v".to_vec())
        );
    }

    #[test]
    fn test_transient_writes_dropped_and_memory_not_hashed() {
        let (mut cms, keys) = setup();
        let base = cms.commit(WriteSet::new()).unwrap();

        let info = cms
            .commit(write(keys["tparams"].mount_id(), b"t", b"1"))
            .unwrap();
        assert_eq!(info.root, base.root);
        assert_eq!(cms.snapshot().get(&keys["tparams"], b"t").unwrap(), None);

        let info = cms.commit(write(keys["mem"].mount_id(), b"m", b"1")).unwrap();
        assert_eq!(info.root, base.root);
        assert!(cms.snapshot().get(&keys["mem"], b"m").unwrap().is_some());
    }

    #[test]
    fn test_root_is_deterministic() {
        let (mut a, ka) = setup();
        let (mut b, kb) = setup();
        let ra = a.commit(write(ka["acc"].mount_id(), b"x", b"y")).unwrap();
        let rb = b.commit(write(kb["acc"].mount_id(), b"x", b"y")).unwrap();
        assert_eq!(ra.root, rb.root);
    }

    #[test]
    fn test_unknown_partition_leaves_store_untouched() {
        let (mut cms, keys) = setup();
        let mut ws = write(keys["bank"].mount_id(), b"k", b"v");
        ws.insert(
            MountId {
                kind: StoreKind::Persistent,
                name: "nope".into(),
            },
            BTreeMap::new(),
        );
        assert!(cms.commit(ws).is_err());
        assert_eq!(cms.version(), 0);
        assert_eq!(cms.snapshot().get(&keys["bank"], b"k").unwrap(), None);
    }
}
