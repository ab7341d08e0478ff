use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Structured key/value metadata attached to a snapshot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotMetadata {
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl SnapshotMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Apply a patch, returning the names of the fields that changed.
    pub fn apply(&mut self, patch: MetadataPatch) -> Vec<String> {
        let mut changed = Vec::new();

        if let Some(author) = patch.author {
            if self.author.as_ref() != Some(&author) {
                self.author = Some(author);
                changed.push("metadata.author".to_string());
            }
        }
        if let Some(tags) = patch.tags {
            if self.tags != tags {
                self.tags = tags;
                changed.push("metadata.tags".to_string());
            }
        }
        if let Some(description) = patch.description {
            if self.description.as_ref() != Some(&description) {
                self.description = Some(description);
                changed.push("metadata.description".to_string());
            }
        }
        for (key, value) in patch.extra {
            if self.extra.get(&key) != Some(&value) {
                changed.push(format!("metadata.extra.{}", key));
                self.extra.insert(key, value);
            }
        }

        changed
    }
}

/// Partial metadata for updates. Unset fields are left alone; `extra` keys merge.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetadataPatch {
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

impl MetadataPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// What an audit record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    Created,
    Updated,
    Superseded,
    Archived,
    Expired,
    Compressed,
    Encrypted,
    Attached,
    Detached,
    Reparented,
    Fetched,
    Hydrated,
}

/// One append-only entry of a snapshot's audit trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub actor: String,
    pub at: SystemTime,
    pub action: AuditAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
}
