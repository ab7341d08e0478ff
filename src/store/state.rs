use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use crate::error::StoreError;
use crate::hierarchy::HierarchyManager;
use crate::index::CategoryIndex;
use crate::snapshot::{AuditAction, Snapshot};
use crate::subscriber::EventKind;

/// Everything guarded by the store lock.
#[derive(Default)]
pub(crate) struct StoreState {
    /// Newest version of every lineage, by id.
    pub live: HashMap<String, Snapshot>,
    /// Version id of every live snapshot, to its id.
    pub versions: HashMap<String, String>,
    /// Superseded versions, by version id. Not indexed.
    pub history: HashMap<String, Snapshot>,
    pub index: CategoryIndex,
    pub hierarchy: HierarchyManager,
    /// Last commit sequence handed to a notification.
    pub sequence: u64,
}

/// Side effect of a committed mutation.
pub(crate) enum Change {
    /// Notify subscribers and mirror to persistence.
    Notify(EventKind, Snapshot),
    /// Mirror to persistence only (a related snapshot that changed too).
    Persist(Snapshot),
}

impl StoreState {
    pub fn live(&self, id: &str) -> Result<&Snapshot, StoreError> {
        self.live
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// A live id, or else a version id. Live ids win when both match.
    pub fn find(&self, id: &str) -> Option<&Snapshot> {
        self.live.get(id).or_else(|| self.version(id))
    }

    /// A stored or live version by version id.
    pub fn version(&self, version_id: &str) -> Option<&Snapshot> {
        self.history.get(version_id).or_else(|| {
            self.versions
                .get(version_id)
                .and_then(|id| self.live.get(id))
        })
    }

    /// Version chain of a live lineage, oldest first.
    pub fn lineage(&self, id: &str) -> Result<Vec<Snapshot>, StoreError> {
        let newest = self.live(id)?;
        let mut chain = vec![newest.clone()];
        let mut seen = HashSet::from([newest.version_id.clone()]);
        let mut cursor = newest.previous_version_id.clone();

        while let Some(version_id) = cursor {
            if !seen.insert(version_id.clone()) {
                break;
            }
            match self.history.get(&version_id) {
                Some(version) => {
                    cursor = version.previous_version_id.clone();
                    chain.push(version.clone());
                }
                None => break,
            }
        }

        chain.reverse();
        Ok(chain)
    }

    /// Replace a live snapshot, keeping the index and version map in step.
    pub fn replace(&mut self, snapshot: Snapshot) {
        match self.live.get(&snapshot.id) {
            Some(old) => {
                self.index.reindex(old, &snapshot);
                self.versions.remove(&old.version_id);
            }
            None => self.index.index(&snapshot),
        }
        self.versions
            .insert(snapshot.version_id.clone(), snapshot.id.clone());
        self.live.insert(snapshot.id.clone(), snapshot);
    }

    /// Take a snapshot out of the live table, index and version map.
    pub fn take(&mut self, id: &str) -> Result<Snapshot, StoreError> {
        let removed = self
            .live
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.index.deindex(&removed);
        self.versions.remove(&removed.version_id);
        Ok(removed)
    }

    /// Apply `f` to a live snapshot, stamp it and record the audit entry.
    pub fn touch<F>(
        &mut self,
        id: &str,
        action: AuditAction,
        now: SystemTime,
        f: F,
    ) -> Result<Snapshot, StoreError>
    where
        F: FnOnce(&mut Snapshot) -> Vec<String>,
    {
        let mut snapshot = self.live(id)?.clone();
        let changed = f(&mut snapshot);
        snapshot.updated_at = now;
        snapshot.record(action, changed, now);
        self.replace(snapshot.clone());
        Ok(snapshot)
    }

    /// Mirror the hierarchy's view of `id` onto its snapshot.
    pub fn sync_links(&mut self, id: &str, action: AuditAction, now: SystemTime) -> Option<Snapshot> {
        let parent = self.hierarchy.parent_of(id).map(str::to_string);
        let children = self.hierarchy.children_of(id);
        let snapshot = self.live.get_mut(id)?;

        let mut changed = Vec::new();
        if snapshot.parent_id != parent {
            snapshot.parent_id = parent;
            changed.push("parentId".to_string());
        }
        if snapshot.child_ids != children {
            snapshot.child_ids = children;
            changed.push("childIds".to_string());
        }
        if changed.is_empty() {
            return None;
        }

        snapshot.updated_at = now;
        snapshot.record(action, changed, now);
        Some(snapshot.clone())
    }

    /// Delete every stored version of a lineage.
    pub fn drop_history(&mut self, newest: &Snapshot) {
        let mut cursor = newest.previous_version_id.clone();
        while let Some(version_id) = cursor {
            cursor = self
                .history
                .remove(&version_id)
                .and_then(|version| version.previous_version_id);
        }
    }
}
