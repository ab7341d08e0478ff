//! Key/value persistence behind the in-memory table.
//!
//! The store mirrors every live snapshot to a [`PersistenceAdapter`] under
//! `snapshot_{storeId}_{snapshotId}`. Adapter failures never fail a store
//! operation: they are logged, reported to subscribers, and the store keeps
//! working in memory.

mod in_memory;

pub use in_memory::InMemoryPersistence;

use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Host-provided byte storage.
pub trait PersistenceAdapter: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Storage key for one snapshot.
pub fn snapshot_key(store_id: &str, snapshot_id: &str) -> String {
    format!("snapshot_{}_{}", store_id, snapshot_id)
}

pub fn encode_snapshot(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(snapshot)?)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}
