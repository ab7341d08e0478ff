use std::fmt;

/// Errors surfaced by the snapshot store and its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No live snapshot or version carries this id.
    NotFound(String),
    /// The id is already used by a live snapshot or a stored version.
    DuplicateId(String),
    /// Optimistic version check failed on update.
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },
    /// Attaching `child` under `parent` would close a loop in the hierarchy.
    CycleDetected { parent: String, child: String },
    /// The batch was rejected before any item ran.
    InvalidBatch(String),
    /// The resolved data source (and its fallback) could not serve the call.
    SourceUnavailable(String),
    /// Encoding or decoding a snapshot failed, or the persistence adapter refused it.
    Serialization(String),
    /// The item was never started because its batch was cancelled.
    Cancelled,
    /// A batch item panicked while running.
    Panicked(String),
    /// A `std::sync` lock was poisoned by a panicking holder.
    LockPoisoned(&'static str),
    /// A subscriber callback returned an error or panicked.
    Subscriber { subscriber_id: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "snapshot not found: {}", id),
            StoreError::DuplicateId(id) => write!(f, "snapshot id already exists: {}", id),
            StoreError::Conflict {
                id,
                expected,
                actual,
            } => write!(
                f,
                "version conflict on snapshot {} (expected version {}, actual {})",
                id, expected, actual
            ),
            StoreError::CycleDetected { parent, child } => write!(
                f,
                "attaching {} under {} would create a cycle",
                child, parent
            ),
            StoreError::InvalidBatch(reason) => write!(f, "invalid batch: {}", reason),
            StoreError::SourceUnavailable(reason) => {
                write!(f, "data source unavailable: {}", reason)
            }
            StoreError::Serialization(reason) => write!(f, "serialization error: {}", reason),
            StoreError::Cancelled => write!(f, "cancelled before start"),
            StoreError::Panicked(reason) => write!(f, "operation panicked: {}", reason),
            StoreError::LockPoisoned(operation) => {
                write!(f, "store lock poisoned during {}", operation)
            }
            StoreError::Subscriber {
                subscriber_id,
                reason,
            } => write!(f, "subscriber {} failed: {}", subscriber_id, reason),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
