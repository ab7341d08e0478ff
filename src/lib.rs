//! Versioned, observable in-memory snapshot store.
//!
//! A [`SnapshotStore`] holds point-in-time captures of arbitrary JSON payloads,
//! indexes them by category, status and tag, keeps parent/child hierarchies,
//! notifies subscribers of every committed change and runs batched
//! take/fetch/update workflows with per-item isolation.

mod batch;
mod config;
mod delegate;
mod error;
mod hierarchy;
mod index;
mod persistence;
mod snapshot;
mod store;
mod subscriber;

pub mod bus;

pub use batch::{
    BatchCoordinator, BatchFailure, BatchItem, BatchResult, CancellationToken, TakeItem,
    UpdateItem,
};
pub use config::{
    CachePolicy, CriteriaOperator, Criterion, DelegateConfig, RetryPolicy, SnapshotStoreConfig,
};
pub use delegate::{
    DataSource, DelegateResolver, RemoteApiClient, RemoteDataSource, Resolution,
    SimulatedDataSource, SourceError, StoreDescriptor, StorePayload, DEFAULT_FAILURE_THRESHOLD,
};
pub use error::StoreError;
pub use hierarchy::{Detached, HierarchyManager};
pub use index::{CategoryIndex, IndexKey};
pub use persistence::{
    decode_snapshot, encode_snapshot, snapshot_key, InMemoryPersistence, PersistenceAdapter,
};
pub use snapshot::{
    merge_payload, AuditAction, AuditRecord, Category, CategoryKey, MetadataPatch, NewSnapshot,
    Snapshot, SnapshotMetadata, SnapshotStatus, SnapshotUpdate, SYSTEM_ACTOR,
};
pub use store::{diff_snapshots, FieldDiff, SnapshotFilter, SnapshotStore};
pub use subscriber::{
    BatchEvent, BatchOperation, CallbackResult, EventKind, FnSubscriber, SnapshotEvent,
    Subscriber, SubscriberRegistry, SubscriptionHandle, SubscriptionScope,
};

// Re-export the EventEmitter used by `bus::EmitterNotificationBus`
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
