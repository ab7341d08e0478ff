use serde::{Deserialize, Serialize};

/// Lifecycle status of a snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SnapshotStatus {
    Pending,
    #[default]
    Active,
    Inactive,
    Archived,
    Expired,
}

impl SnapshotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotStatus::Pending => "Pending",
            SnapshotStatus::Active => "Active",
            SnapshotStatus::Inactive => "Inactive",
            SnapshotStatus::Archived => "Archived",
            SnapshotStatus::Expired => "Expired",
        }
    }
}
