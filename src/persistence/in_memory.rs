use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;

use super::PersistenceAdapter;

/// In-memory persistence backed by `Arc<RwLock<HashMap>>`.
///
/// Clone-friendly (cloning shares the same underlying storage).
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .storage
            .read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

impl PersistenceAdapter for InMemoryPersistence {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::LockPoisoned("persistence read"))?;
        Ok(storage.get(key).cloned())
    }

    fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::LockPoisoned("persistence write"))?;
        storage.insert(key.to_string(), bytes);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::LockPoisoned("persistence write"))?;
        storage.remove(key);
        Ok(())
    }
}
