use std::fmt;

use serde_json::Value;

use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Error type for data-source calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Transient failure; the call may be retried.
    Unavailable(String),
    /// The source has no data for the requested id.
    NotFound(String),
    /// The source answered with something that could not be read.
    Malformed(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(msg) => write!(f, "source unavailable: {}", msg),
            SourceError::NotFound(id) => write!(f, "source has no data for {}", id),
            SourceError::Malformed(msg) => write!(f, "malformed source response: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<SourceError> for StoreError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(msg) => StoreError::SourceUnavailable(msg),
            SourceError::NotFound(id) => StoreError::NotFound(id),
            SourceError::Malformed(msg) => StoreError::Serialization(msg),
        }
    }
}

/// Where a store fetches payloads from and pushes snapshots to.
pub trait DataSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch the raw response for `id`.
    fn fetch(&self, store_id: &str, id: &str) -> Result<Value, SourceError>;

    /// Push a snapshot to the source.
    fn push(&self, store_id: &str, snapshot: &Snapshot) -> Result<(), SourceError>;

    /// Probe used when revalidating a source that was marked unavailable.
    fn health_check(&self) -> Result<(), SourceError> {
        Ok(())
    }
}
