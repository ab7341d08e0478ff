use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::category::Category;
use super::metadata::{AuditAction, AuditRecord, MetadataPatch, SnapshotMetadata};
use super::status::SnapshotStatus;

/// Actor recorded in the audit trail when no author is known.
pub const SYSTEM_ACTOR: &str = "system";

/// A point-in-time capture of an arbitrary payload.
///
/// `id` names the lineage; `version_id` names this particular version and is
/// what `previous_version_id` / `next_version_id` point at.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub version_id: String,
    pub category: Category,
    pub status: SnapshotStatus,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub version: u64,
    pub previous_version_id: Option<String>,
    pub next_version_id: Option<String>,
    pub payload: Value,
    #[serde(default)]
    pub metadata: SnapshotMetadata,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub child_ids: Vec<String>,
    pub expiration_date: Option<SystemTime>,
    #[serde(default)]
    pub is_compressed: bool,
    #[serde(default)]
    pub is_encrypted: bool,
    #[serde(default)]
    pub audit_trail: Vec<AuditRecord>,
}

impl Snapshot {
    pub fn version_id_for(id: &str, version: u64) -> String {
        format!("{}@v{}", id, version)
    }

    /// Build version 1 of a new lineage.
    pub(crate) fn from_new(new: NewSnapshot, category: Category, now: SystemTime) -> Self {
        let mut snapshot = Snapshot {
            version_id: Self::version_id_for(&new.id, 1),
            id: new.id,
            category,
            status: new.status,
            created_at: now,
            updated_at: now,
            version: 1,
            previous_version_id: None,
            next_version_id: None,
            payload: new.payload,
            metadata: new.metadata,
            parent_id: None,
            child_ids: Vec::new(),
            expiration_date: new.expiration_date,
            is_compressed: false,
            is_encrypted: false,
            audit_trail: Vec::new(),
        };
        snapshot.record(AuditAction::Created, Vec::new(), now);
        snapshot
    }

    /// Derive the next version of this lineage from `update`.
    ///
    /// The returned snapshot links back to `self`; the caller links `self` forward.
    pub(crate) fn next_version(
        &self,
        update: SnapshotUpdate,
        now: SystemTime,
    ) -> (Snapshot, Vec<String>) {
        let mut next = self.clone();
        let mut changed = Vec::new();

        if let Some(patch) = update.payload {
            let before = next.payload.clone();
            merge_payload(&mut next.payload, patch);
            if next.payload != before {
                changed.push("payload".to_string());
            }
        }
        if let Some(patch) = update.metadata {
            changed.extend(next.metadata.apply(patch));
        }

        next.version = self.version + 1;
        next.version_id = Self::version_id_for(&self.id, next.version);
        next.previous_version_id = Some(self.version_id.clone());
        next.next_version_id = None;
        next.updated_at = now;
        next.record(AuditAction::Updated, changed.clone(), now);

        (next, changed)
    }

    pub fn tags(&self) -> &[String] {
        &self.metadata.tags
    }

    /// Expired by status or by a passed expiration date.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.status == SnapshotStatus::Expired
            || self.expiration_date.is_some_and(|at| at <= now)
    }

    /// Mark as compressed. Idempotent.
    pub fn compress(&mut self) {
        self.is_compressed = true;
    }

    /// Mark as encrypted. Idempotent.
    pub fn encrypt(&mut self) {
        self.is_encrypted = true;
    }

    /// Append an audit record attributed to the metadata author.
    pub fn record(&mut self, action: AuditAction, changed_fields: Vec<String>, at: SystemTime) {
        let actor = self
            .metadata
            .author
            .clone()
            .unwrap_or_else(|| SYSTEM_ACTOR.to_string());
        self.audit_trail.push(AuditRecord {
            actor,
            at,
            action,
            changed_fields,
        });
    }

    /// JSON form used for criteria evaluation and field comparison.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Merge a partial payload into an existing one.
///
/// Two objects merge key by key (a `null` removes the key); anything else
/// replaces the old payload.
pub fn merge_payload(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(partial)) => {
            for (key, value) in partial {
                if value.is_null() {
                    existing.remove(&key);
                } else {
                    existing.insert(key, value);
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Input for creating a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct NewSnapshot {
    pub id: String,
    pub payload: Value,
    pub category: Option<Category>,
    pub metadata: SnapshotMetadata,
    pub status: SnapshotStatus,
    pub parent_id: Option<String>,
    pub expiration_date: Option<SystemTime>,
}

impl NewSnapshot {
    pub fn new(id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: id.into(),
            payload,
            category: None,
            metadata: SnapshotMetadata::default(),
            status: SnapshotStatus::Active,
            parent_id: None,
            expiration_date: None,
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

    pub fn with_status(mut self, status: SnapshotStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn expires_at(mut self, at: SystemTime) -> Self {
        self.expiration_date = Some(at);
        self
    }
}

/// Partial update producing a new version.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotUpdate {
    pub payload: Option<Value>,
    pub metadata: Option<MetadataPatch>,
    pub expected_version: Option<u64>,
}

impl SnapshotUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_metadata(mut self, patch: MetadataPatch) -> Self {
        self.metadata = Some(patch);
        self
    }

    /// Fail with `Conflict` unless the live version equals `version`.
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}
