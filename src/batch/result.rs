use serde_json::Value;

use crate::error::StoreError;
use crate::snapshot::{Category, Snapshot, SnapshotMetadata, SnapshotUpdate};

/// One item that did not succeed, with the reason.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchFailure {
    pub id: String,
    pub reason: StoreError,
}

/// Structured outcome of a batch. Items keep their request order within each list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchResult {
    pub succeeded: Vec<Snapshot>,
    pub failed: Vec<BatchFailure>,
}

impl BatchResult {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded_ids(&self) -> Vec<&str> {
        self.succeeded.iter().map(|s| s.id.as_str()).collect()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.id.as_str()).collect()
    }
}

/// Anything a batch can be made of. The id identifies the item in the result.
pub trait BatchItem {
    fn id(&self) -> &str;
}

impl BatchItem for String {
    fn id(&self) -> &str {
        self
    }
}

/// A snapshot to take as part of `batch_take`.
///
/// Without a category the store's configured category applies.
#[derive(Clone, Debug, PartialEq)]
pub struct TakeItem {
    pub id: String,
    pub payload: Value,
    pub category: Option<Category>,
    pub metadata: SnapshotMetadata,
}

impl TakeItem {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
            category: None,
            metadata: SnapshotMetadata::default(),
        }
    }

    pub fn in_category(mut self, category: impl Into<Category>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_metadata(mut self, metadata: SnapshotMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl BatchItem for TakeItem {
    fn id(&self) -> &str {
        &self.id
    }
}

/// An update applied as part of `batch_update`.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateItem {
    pub id: String,
    pub update: SnapshotUpdate,
}

impl UpdateItem {
    pub fn new(id: impl Into<String>, update: SnapshotUpdate) -> Self {
        Self {
            id: id.into(),
            update,
        }
    }
}

impl BatchItem for UpdateItem {
    fn id(&self) -> &str {
        &self.id
    }
}
