use std::collections::{BTreeSet, HashMap};

use crate::snapshot::{Category, CategoryKey, Snapshot, SnapshotStatus};

/// A single index lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexKey {
    Category(Category),
    Status(SnapshotStatus),
    Tag(String),
}

/// Keys a snapshot was indexed under, kept so refreshes never leave stale entries.
#[derive(Debug)]
struct IndexedKeys {
    category: CategoryKey,
    status: SnapshotStatus,
    tags: Vec<String>,
}

/// Maps category, status and tag to snapshot ids.
///
/// Lives next to the snapshot table inside the store's lock, so every write is
/// visible to the next read on the same store.
#[derive(Debug, Default)]
pub struct CategoryIndex {
    by_category: HashMap<CategoryKey, BTreeSet<String>>,
    by_status: HashMap<SnapshotStatus, BTreeSet<String>>,
    by_tag: HashMap<String, BTreeSet<String>>,
    entries: HashMap<String, IndexedKeys>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh the entries for `snapshot`.
    pub fn index(&mut self, snapshot: &Snapshot) {
        self.remove_entries(&snapshot.id);

        let keys = IndexedKeys {
            category: snapshot.category.index_key(),
            status: snapshot.status,
            tags: snapshot.tags().to_vec(),
        };

        self.by_category
            .entry(keys.category.clone())
            .or_default()
            .insert(snapshot.id.clone());
        self.by_status
            .entry(keys.status)
            .or_default()
            .insert(snapshot.id.clone());
        for tag in &keys.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(snapshot.id.clone());
        }

        self.entries.insert(snapshot.id.clone(), keys);
    }

    pub fn deindex(&mut self, snapshot: &Snapshot) {
        self.remove_entries(&snapshot.id);
    }

    pub fn reindex(&mut self, old: &Snapshot, new: &Snapshot) {
        self.deindex(old);
        self.index(new);
    }

    /// Ids under a single key.
    pub fn lookup(&self, key: &IndexKey) -> BTreeSet<String> {
        let bucket = match key {
            IndexKey::Category(category) => self.by_category.get(&category.index_key()),
            IndexKey::Status(status) => self.by_status.get(status),
            IndexKey::Tag(tag) => self.by_tag.get(tag),
        };
        bucket.cloned().unwrap_or_default()
    }

    /// Ids matching every key. No keys matches every indexed id.
    pub fn lookup_all(&self, keys: &[IndexKey]) -> BTreeSet<String> {
        let mut keys = keys.iter();
        let Some(first) = keys.next() else {
            return self.entries.keys().cloned().collect();
        };

        let mut result = self.lookup(first);
        for key in keys {
            if result.is_empty() {
                break;
            }
            let next = self.lookup(key);
            result.retain(|id| next.contains(id));
        }
        result
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entries(&mut self, id: &str) {
        let Some(keys) = self.entries.remove(id) else {
            return;
        };

        remove_from(&mut self.by_category, &keys.category, id);
        remove_from(&mut self.by_status, &keys.status, id);
        for tag in &keys.tags {
            remove_from(&mut self.by_tag, tag, id);
        }
    }
}

fn remove_from<K>(map: &mut HashMap<K, BTreeSet<String>>, key: &K, id: &str)
where
    K: std::hash::Hash + Eq,
{
    if let Some(bucket) = map.get_mut(key) {
        bucket.remove(id);
        if bucket.is_empty() {
            map.remove(key);
        }
    }
}
