use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::SystemTime;

use tracing::{debug, warn};

use crate::batch::{BatchCoordinator, BatchResult, CancellationToken, TakeItem, UpdateItem};
use crate::bus::{ANALYZE_DATA_ERROR, PERSISTENCE_ERROR};
use crate::config::SnapshotStoreConfig;
use crate::delegate::{DelegateResolver, SimulatedDataSource, StorePayload};
use crate::error::StoreError;
use crate::persistence::{decode_snapshot, encode_snapshot, snapshot_key, PersistenceAdapter};
use crate::snapshot::{
    AuditAction, Category, NewSnapshot, Snapshot, SnapshotStatus, SnapshotUpdate,
};
use crate::subscriber::{
    BatchOperation, EventKind, Notification, SnapshotEvent, Subscriber, SubscriberRegistry,
    SubscriptionHandle, SubscriptionScope,
};

use super::diff::{diff_snapshots, FieldDiff};
use super::filter::SnapshotFilter;
use super::state::{Change, StoreState};

/// Versioned, observable snapshot container.
///
/// The store is the only mutator of its snapshot table. Reads take a shared
/// lock, mutations an exclusive one; the category index and hierarchy live
/// under the same lock, so a read after a write always sees both. Change
/// notifications are queued in commit order while the lock is held and
/// delivered after it is released.
///
/// Data-source calls (`fetch`, `sync`, `batch_fetch`) run outside the lock.
pub struct SnapshotStore {
    config: Arc<SnapshotStoreConfig>,
    state: RwLock<StoreState>,
    registry: Arc<SubscriberRegistry>,
    persistence: Option<Arc<dyn PersistenceAdapter>>,
    resolver: DelegateResolver,
    batch: BatchCoordinator,
}

impl SnapshotStore {
    pub fn new(config: SnapshotStoreConfig) -> Self {
        let registry = Arc::new(SubscriberRegistry::new());
        let batch = BatchCoordinator::new(
            config.store_id.clone(),
            Arc::clone(&registry),
            config.batch_workers,
        );
        Self {
            config: Arc::new(config),
            state: RwLock::new(StoreState::default()),
            registry,
            persistence: None,
            resolver: DelegateResolver::new(Arc::new(SimulatedDataSource::new())),
            batch,
        }
    }

    /// Use a registry shared with other stores.
    pub fn with_registry(mut self, registry: Arc<SubscriberRegistry>) -> Self {
        self.batch = BatchCoordinator::new(
            self.config.store_id.clone(),
            Arc::clone(&registry),
            self.config.batch_workers,
        );
        self.registry = registry;
        self
    }

    /// Mirror live snapshots to `adapter`.
    pub fn with_persistence(mut self, adapter: Arc<dyn PersistenceAdapter>) -> Self {
        self.persistence = Some(adapter);
        self
    }

    pub fn with_resolver(mut self, resolver: DelegateResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn store_id(&self) -> &str {
        &self.config.store_id
    }

    pub fn config(&self) -> &SnapshotStoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &DelegateResolver {
        &self.resolver
    }

    /// Number of live snapshots.
    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self.read("len")?;
        Ok(state.live.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    // ---- CRUD ----

    /// Create version 1 of a new snapshot.
    ///
    /// Fails with `DuplicateId` if `id` is already live, and with `NotFound`
    /// if the requested parent does not exist.
    pub fn create(&self, new: NewSnapshot) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate("create", |state, changes| {
            let created = self.insert_new(state, new, now)?;
            changes.extend(Self::parent_change(state, &created));
            changes.insert(0, Change::Notify(EventKind::Added, created.clone()));
            Ok(created)
        })
    }

    /// Live snapshot by id, or else any stored version by version id.
    ///
    /// A live id shadows an equal version id; `get_version` is unambiguous.
    pub fn get(&self, id: &str) -> Result<Snapshot, StoreError> {
        let state = self.read("get")?;
        state
            .find(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn get_version(&self, id: &str, version: u64) -> Result<Snapshot, StoreError> {
        let version_id = Snapshot::version_id_for(id, version);
        let state = self.read("get_version")?;
        state
            .version(&version_id)
            .cloned()
            .ok_or(StoreError::NotFound(version_id))
    }

    /// All versions of a lineage, oldest first.
    pub fn history(&self, id: &str) -> Result<Vec<Snapshot>, StoreError> {
        let state = self.read("history")?;
        state.lineage(id)
    }

    /// Produce the next version of `id`.
    ///
    /// The superseded version moves to history, linked forward to the new one,
    /// and becomes `Archived` unless the store keeps previous versions active.
    pub fn update(&self, id: &str, update: SnapshotUpdate) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate("update", |state, changes| {
            let next = self.apply_update(state, id, update, now)?;
            changes.push(Change::Notify(EventKind::Updated, next.clone()));
            Ok(next)
        })
    }

    /// Permanently remove a snapshot and its history.
    ///
    /// Children move to the removed snapshot's parent, or become roots.
    pub fn remove(&self, id: &str) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate("remove", |state, changes| {
            let removed = state.take(id)?;
            state.drop_history(&removed);

            let detached = state.hierarchy.remove(id);
            for child in &detached.reparented {
                if let Some(snapshot) = state.sync_links(child, AuditAction::Reparented, now) {
                    changes.push(Change::Persist(snapshot));
                }
            }
            if let Some(parent) = &detached.parent {
                if let Some(snapshot) = state.sync_links(parent, AuditAction::Detached, now) {
                    changes.push(Change::Persist(snapshot));
                }
            }

            changes.insert(0, Change::Notify(EventKind::Removed, removed.clone()));
            Ok(removed)
        })
    }

    /// Live snapshots matching `filter`, ordered by id.
    pub fn query(&self, filter: &SnapshotFilter) -> Result<Vec<Snapshot>, StoreError> {
        let now = SystemTime::now();
        let state = self.read("query")?;
        let ids = state.index.lookup_all(&filter.index_keys());
        let matches = ids
            .iter()
            .filter_map(|id| state.live.get(id))
            .filter(|snapshot| filter.admits(snapshot, now))
            .cloned()
            .collect();
        Ok(matches)
    }

    /// Field-wise diff of two snapshots (live ids or version ids).
    pub fn compare(&self, left: &str, right: &str) -> Result<BTreeMap<String, FieldDiff>, StoreError> {
        let state = self.read("compare")?;
        let left = state
            .find(left)
            .ok_or_else(|| StoreError::NotFound(left.to_string()))?;
        let right = state
            .find(right)
            .ok_or_else(|| StoreError::NotFound(right.to_string()))?;
        Ok(diff_snapshots(left, right))
    }

    // ---- lifecycle ----

    pub fn archive(&self, id: &str) -> Result<Snapshot, StoreError> {
        self.set_status(id, SnapshotStatus::Archived, AuditAction::Archived, "archive")
    }

    /// Mark every live snapshot past its expiration date `Expired`.
    ///
    /// Returns the ids that changed, in id order.
    pub fn expire_due(&self) -> Result<Vec<String>, StoreError> {
        let now = SystemTime::now();
        self.mutate("expire_due", |state, changes| {
            let mut due: Vec<String> = state
                .live
                .values()
                .filter(|s| s.status != SnapshotStatus::Expired && s.is_expired_at(now))
                .map(|s| s.id.clone())
                .collect();
            due.sort();

            for id in &due {
                let expired = state.touch(id, AuditAction::Expired, now, |s| {
                    s.status = SnapshotStatus::Expired;
                    vec!["status".to_string()]
                })?;
                changes.push(Change::Notify(EventKind::Updated, expired));
            }
            Ok(due)
        })
    }

    /// Set the compressed flag. Idempotent.
    pub fn compress(&self, id: &str) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate("compress", |state, changes| {
            let snapshot = state.touch(id, AuditAction::Compressed, now, |s| {
                s.compress();
                vec!["isCompressed".to_string()]
            })?;
            changes.push(Change::Notify(EventKind::Updated, snapshot.clone()));
            Ok(snapshot)
        })
    }

    /// Set the encrypted flag. Idempotent.
    pub fn encrypt(&self, id: &str) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate("encrypt", |state, changes| {
            let snapshot = state.touch(id, AuditAction::Encrypted, now, |s| {
                s.encrypt();
                vec!["isEncrypted".to_string()]
            })?;
            changes.push(Change::Notify(EventKind::Updated, snapshot.clone()));
            Ok(snapshot)
        })
    }

    // ---- hierarchy ----

    /// Attach `child` under `parent`, moving it from any previous parent.
    ///
    /// Fails with `CycleDetected`, leaving the tree unchanged, when `child` is
    /// `parent` or one of its ancestors.
    pub fn attach_child(&self, parent: &str, child: &str) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate("attach_child", |state, changes| {
            state.live(parent)?;
            state.live(child)?;

            let previous = state.hierarchy.attach(parent, child)?;
            let updated = match state.sync_links(child, AuditAction::Attached, now) {
                Some(updated) => updated,
                None => return state.live(child).cloned(),
            };

            changes.push(Change::Notify(EventKind::Updated, updated.clone()));
            if let Some(snapshot) = state.sync_links(parent, AuditAction::Attached, now) {
                changes.push(Change::Persist(snapshot));
            }
            if let Some(old) = previous {
                if let Some(snapshot) = state.sync_links(&old, AuditAction::Detached, now) {
                    changes.push(Change::Persist(snapshot));
                }
            }
            Ok(updated)
        })
    }

    /// Detach `child` from `parent`. Returns false when they were not linked.
    pub fn detach_child(&self, parent: &str, child: &str) -> Result<bool, StoreError> {
        let now = SystemTime::now();
        self.mutate("detach_child", |state, changes| {
            state.live(parent)?;
            state.live(child)?;
            if !state.hierarchy.detach(parent, child) {
                return Ok(false);
            }

            if let Some(snapshot) = state.sync_links(child, AuditAction::Detached, now) {
                changes.push(Change::Notify(EventKind::Updated, snapshot));
            }
            if let Some(snapshot) = state.sync_links(parent, AuditAction::Detached, now) {
                changes.push(Change::Persist(snapshot));
            }
            Ok(true)
        })
    }

    /// Child ids in attach order.
    pub fn get_children(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let state = self.read("get_children")?;
        state.live(id)?;
        Ok(state.hierarchy.children_of(id))
    }

    pub fn get_parent_id(&self, id: &str) -> Result<Option<String>, StoreError> {
        let state = self.read("get_parent_id")?;
        state.live(id)?;
        Ok(state.hierarchy.parent_of(id).map(str::to_string))
    }

    /// All descendants, breadth-first.
    pub fn descendants_of(&self, id: &str) -> Result<Vec<String>, StoreError> {
        let state = self.read("descendants_of")?;
        state.live(id)?;
        Ok(state.hierarchy.descendants_of(id))
    }

    pub fn is_descendant_of(&self, child: &str, ancestor: &str) -> Result<bool, StoreError> {
        let state = self.read("is_descendant_of")?;
        Ok(state.hierarchy.is_descendant_of(child, ancestor))
    }

    // ---- subscriptions ----

    pub fn subscribe(
        &self,
        subscriber: Arc<dyn Subscriber>,
        scope: SubscriptionScope,
    ) -> Result<SubscriptionHandle, StoreError> {
        self.registry.subscribe(subscriber, scope)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<bool, StoreError> {
        self.registry.unsubscribe(handle)
    }

    // ---- data source and persistence ----

    /// Pull `id` from the resolved data source and upsert it.
    ///
    /// An existing snapshot gets a new version carrying the fetched payload;
    /// otherwise a snapshot is created in the configured category.
    pub fn fetch(&self, id: &str) -> Result<Snapshot, StoreError> {
        let response = match self.resolver.fetch(&self.config, self.store_id(), id) {
            Ok(response) => response,
            Err(err @ StoreError::SourceUnavailable(_)) => {
                self.registry
                    .report_error(self.store_id(), ANALYZE_DATA_ERROR, err.clone())?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let payload = StorePayload::from_response(response).into_payload(id)?;

        let now = SystemTime::now();
        self.mutate("fetch", |state, changes| {
            let (kind, mut snapshot) = if state.live.contains_key(id) {
                let next = self.apply_update(state, id, SnapshotUpdate::payload(payload), now)?;
                (EventKind::Updated, next)
            } else {
                let created = self.insert_new(state, NewSnapshot::new(id, payload), now)?;
                (EventKind::Added, created)
            };

            snapshot.record(AuditAction::Fetched, vec!["payload".to_string()], now);
            state.replace(snapshot.clone());
            changes.push(Change::Notify(kind, snapshot.clone()));
            Ok(snapshot)
        })
    }

    /// Push the live snapshot to the resolved data source.
    pub fn sync(&self, id: &str) -> Result<(), StoreError> {
        let snapshot = {
            let state = self.read("sync")?;
            state.live(id)?.clone()
        };
        self.resolver.push(&self.config, self.store_id(), &snapshot)?;
        debug!(store_id = %self.store_id(), snapshot_id = %id, "Snapshot synced");
        Ok(())
    }

    /// Restore a snapshot from the persistence adapter.
    ///
    /// Only ids that are not in the store can be hydrated. Hierarchy links are
    /// kept where the other end is live, and version links where the version
    /// is still in history.
    pub fn hydrate(&self, id: &str) -> Result<Snapshot, StoreError> {
        let adapter = self
            .persistence
            .as_ref()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let bytes = adapter
            .read(&snapshot_key(self.store_id(), id))?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let mut snapshot = decode_snapshot(&bytes)?;
        if snapshot.id != id {
            return Err(StoreError::Serialization(format!(
                "stored snapshot under {} has id {}",
                id, snapshot.id
            )));
        }
        if snapshot.version_id != Snapshot::version_id_for(id, snapshot.version) {
            return Err(StoreError::Serialization(format!(
                "stored snapshot {} has version id {} for version {}",
                id, snapshot.version_id, snapshot.version
            )));
        }

        let now = SystemTime::now();
        self.mutate("hydrate", |state, changes| {
            if state.live.contains_key(id) {
                return Err(StoreError::DuplicateId(id.to_string()));
            }

            let parent = snapshot.parent_id.take();
            let children = std::mem::take(&mut snapshot.child_ids);
            if snapshot
                .previous_version_id
                .as_ref()
                .is_some_and(|v| state.history.get(v).map_or(true, |h| h.id != id))
            {
                snapshot.previous_version_id = None;
            }
            snapshot.next_version_id = None;
            snapshot.record(AuditAction::Hydrated, Vec::new(), now);
            state.replace(snapshot);

            let mut related = Vec::new();
            if let Some(parent) = parent.filter(|p| state.live.contains_key(p)) {
                if state.hierarchy.attach(&parent, id).is_ok() {
                    related.push(parent);
                }
            }
            for child in children {
                let orphan =
                    state.live.contains_key(&child) && state.hierarchy.parent_of(&child).is_none();
                if orphan && state.hierarchy.attach(id, &child).is_ok() {
                    related.push(child);
                }
            }

            state.sync_links(id, AuditAction::Attached, now);
            for other in related {
                if let Some(snapshot) = state.sync_links(&other, AuditAction::Attached, now) {
                    changes.push(Change::Persist(snapshot));
                }
            }

            let hydrated = state.live(id)?.clone();
            changes.insert(0, Change::Notify(EventKind::Added, hydrated.clone()));
            Ok(hydrated)
        })
    }

    // ---- batches ----

    pub fn batch_take(
        &self,
        items: &[TakeItem],
        cancel: &CancellationToken,
    ) -> Result<BatchResult, StoreError> {
        self.batch.run(BatchOperation::Take, items, cancel, |item| {
            let mut new = NewSnapshot::new(item.id.clone(), item.payload.clone())
                .with_metadata(item.metadata.clone());
            new.category = item.category.clone();
            self.create(new)
        })
    }

    pub fn batch_fetch(
        &self,
        ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<BatchResult, StoreError> {
        self.batch
            .run(BatchOperation::Fetch, ids, cancel, |id| self.fetch(id))
    }

    pub fn batch_update(
        &self,
        items: &[UpdateItem],
        cancel: &CancellationToken,
    ) -> Result<BatchResult, StoreError> {
        self.batch.run(BatchOperation::Update, items, cancel, |item| {
            self.update(&item.id, item.update.clone())
        })
    }

    // ---- internals ----

    fn read(
        &self,
        operation: &'static str,
    ) -> Result<RwLockReadGuard<'_, StoreState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::LockPoisoned(operation))
    }

    /// Run `f` under the write lock, then publish its changes.
    ///
    /// Nothing is persisted or queued when `f` fails. Queued notifications are
    /// delivered once the lock is released.
    fn mutate<R, F>(&self, operation: &'static str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut StoreState, &mut Vec<Change>) -> Result<R, StoreError>,
    {
        let result = {
            let mut state = self
                .state
                .write()
                .map_err(|_| StoreError::LockPoisoned(operation))?;
            let mut changes = Vec::new();
            let result = f(&mut *state, &mut changes)?;

            for change in changes {
                match change {
                    Change::Notify(kind, snapshot) => {
                        state.sequence += 1;
                        let persisted = match kind {
                            EventKind::Removed => self.unpersist(&snapshot.id),
                            EventKind::Added | EventKind::Updated => self.persist(&snapshot),
                        };
                        self.queue(Notification::Snapshot(SnapshotEvent {
                            kind,
                            store_id: self.config.store_id.clone(),
                            sequence: state.sequence,
                            snapshot,
                        }));
                        if let Err(error) = persisted {
                            self.queue_persistence_error(error);
                        }
                    }
                    Change::Persist(snapshot) => {
                        if let Err(error) = self.persist(&snapshot) {
                            self.queue_persistence_error(error);
                        }
                    }
                }
            }
            result
        };

        self.registry.flush();
        Ok(result)
    }

    fn queue(&self, notification: Notification) {
        if let Err(err) = self.registry.enqueue(notification) {
            warn!(store_id = %self.config.store_id, error = %err, "Dropped notification");
        }
    }

    fn queue_persistence_error(&self, error: StoreError) {
        warn!(
            store_id = %self.config.store_id,
            error = %error,
            "Persistence failed, continuing in memory"
        );
        self.queue(Notification::Error {
            store_id: self.config.store_id.clone(),
            event_type: PERSISTENCE_ERROR,
            error,
        });
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let Some(adapter) = &self.persistence else {
            return Ok(());
        };
        let bytes = encode_snapshot(snapshot)?;
        adapter.write(&snapshot_key(&self.config.store_id, &snapshot.id), bytes)
    }

    fn unpersist(&self, id: &str) -> Result<(), StoreError> {
        match &self.persistence {
            Some(adapter) => adapter.delete(&snapshot_key(&self.config.store_id, id)),
            None => Ok(()),
        }
    }

    fn default_category(&self) -> Category {
        self.config.category.clone().unwrap_or_default()
    }

    /// Validate and insert a new lineage. Parent links are made here; the
    /// caller reports the parent via `parent_change`.
    fn insert_new(
        &self,
        state: &mut StoreState,
        mut new: NewSnapshot,
        now: SystemTime,
    ) -> Result<Snapshot, StoreError> {
        if state.live.contains_key(&new.id) {
            return Err(StoreError::DuplicateId(new.id));
        }
        let parent = new.parent_id.take();
        if let Some(parent) = &parent {
            state.live(parent)?;
        }

        let category = new.category.take().unwrap_or_else(|| self.default_category());
        let snapshot = Snapshot::from_new(new, category, now);
        let id = snapshot.id.clone();
        state.replace(snapshot);

        if let Some(parent) = parent {
            state.hierarchy.attach(&parent, &id)?;
            if let Some(snapshot) = state.live.get_mut(&id) {
                snapshot.parent_id = Some(parent);
            }
        }
        state.live(&id).cloned()
    }

    /// Sync the parent of a freshly inserted snapshot.
    fn parent_change(state: &mut StoreState, created: &Snapshot) -> Option<Change> {
        let parent = created.parent_id.as_deref()?.to_string();
        state
            .sync_links(&parent, AuditAction::Attached, created.created_at)
            .map(Change::Persist)
    }

    fn apply_update(
        &self,
        state: &mut StoreState,
        id: &str,
        update: SnapshotUpdate,
        now: SystemTime,
    ) -> Result<Snapshot, StoreError> {
        let current = state.live(id)?.clone();
        if let Some(expected) = update.expected_version {
            if expected != current.version {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: current.version,
                });
            }
        }

        let (next, _) = current.next_version(update, now);

        let mut superseded = current;
        superseded.next_version_id = Some(next.version_id.clone());
        let mut fields = vec!["nextVersionId".to_string()];
        if !self.config.keep_previous_versions_active {
            superseded.status = SnapshotStatus::Archived;
            fields.push("status".to_string());
        }
        superseded.record(AuditAction::Superseded, fields, now);

        state
            .history
            .insert(superseded.version_id.clone(), superseded);
        state.replace(next.clone());
        Ok(next)
    }

    fn set_status(
        &self,
        id: &str,
        status: SnapshotStatus,
        action: AuditAction,
        operation: &'static str,
    ) -> Result<Snapshot, StoreError> {
        let now = SystemTime::now();
        self.mutate(operation, |state, changes| {
            let snapshot = state.touch(id, action, now, |s| {
                s.status = status;
                vec!["status".to_string()]
            })?;
            changes.push(Change::Notify(EventKind::Updated, snapshot.clone()));
            Ok(snapshot)
        })
    }
}
