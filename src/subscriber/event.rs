use serde::{Deserialize, Serialize};

use crate::batch::BatchFailure;
use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Closed set of change kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Added,
    Removed,
    Updated,
}

/// A committed change to one snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotEvent {
    pub kind: EventKind,
    pub store_id: String,
    /// Per-store commit sequence, strictly increasing.
    pub sequence: u64,
    /// The snapshot after the change (before it, for `Removed`).
    pub snapshot: Snapshot,
}

/// The batch workflow a [`BatchEvent`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOperation {
    Take,
    Fetch,
    Update,
}

impl BatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchOperation::Take => "take",
            BatchOperation::Fetch => "fetch",
            BatchOperation::Update => "update",
        }
    }
}

/// Aggregate batch lifecycle events: request, then success and (when any
/// item failed) failure.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchEvent {
    Requested {
        operation: BatchOperation,
        ids: Vec<String>,
    },
    Succeeded {
        operation: BatchOperation,
        snapshots: Vec<Snapshot>,
    },
    Failed {
        operation: BatchOperation,
        failures: Vec<BatchFailure>,
    },
}

/// Queue entry inside the registry.
#[derive(Clone, Debug)]
pub(crate) enum Notification {
    Snapshot(SnapshotEvent),
    Batch {
        store_id: String,
        event: BatchEvent,
    },
    Error {
        store_id: String,
        event_type: &'static str,
        error: StoreError,
    },
}

impl Notification {
    pub(crate) fn store_id(&self) -> &str {
        match self {
            Notification::Snapshot(event) => &event.store_id,
            Notification::Batch { store_id, .. } | Notification::Error { store_id, .. } => {
                store_id
            }
        }
    }
}
