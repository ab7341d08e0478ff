//! Snapshot data model.

mod category;
mod metadata;
#[allow(clippy::module_inception)]
mod snapshot;
mod status;

pub use category::{Category, CategoryKey};
pub use metadata::{AuditAction, AuditRecord, MetadataPatch, SnapshotMetadata};
pub use snapshot::{merge_payload, NewSnapshot, Snapshot, SnapshotUpdate, SYSTEM_ACTOR};
pub use status::SnapshotStatus;
