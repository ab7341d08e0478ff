use std::time::SystemTime;

use crate::config::{Criterion, SnapshotStoreConfig};
use crate::index::IndexKey;
use crate::snapshot::{Category, Snapshot, SnapshotStatus};

/// Query over live snapshots. Set fields are ANDed.
///
/// Expired snapshots (by status or by a passed expiration date) are left out
/// unless the filter asks for `Expired` or sets `include_expired`. Asking for
/// `Expired` matches both kinds, whether or not `expire_due` has run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SnapshotFilter {
    pub category: Option<Category>,
    pub status: Option<SnapshotStatus>,
    pub tag: Option<String>,
    pub criteria: Vec<Criterion>,
    pub include_expired: bool,
}

impl SnapshotFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Category and criteria taken from the store configuration.
    pub fn from_config(config: &SnapshotStoreConfig) -> Self {
        Self {
            category: config.category.clone(),
            criteria: config.criteria.clone(),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<Category>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn status(mut self, status: SnapshotStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn including_expired(mut self) -> Self {
        self.include_expired = true;
        self
    }

    pub(crate) fn index_keys(&self) -> Vec<IndexKey> {
        let mut keys = Vec::new();
        if let Some(category) = &self.category {
            keys.push(IndexKey::Category(category.clone()));
        }
        // Expired also covers passed expiration dates that no sweep has
        // recorded yet, so it cannot come from the status bucket.
        if let Some(status) = self.status.filter(|s| *s != SnapshotStatus::Expired) {
            keys.push(IndexKey::Status(status));
        }
        if let Some(tag) = &self.tag {
            keys.push(IndexKey::Tag(tag.clone()));
        }
        keys
    }

    /// Checks the index cannot answer: expiry and criteria.
    pub(crate) fn admits(&self, snapshot: &Snapshot, now: SystemTime) -> bool {
        let expired = snapshot.is_expired_at(now);
        match self.status {
            Some(SnapshotStatus::Expired) if !expired => return false,
            Some(SnapshotStatus::Expired) => {}
            _ if expired && !self.include_expired => return false,
            _ => {}
        }
        if self.criteria.is_empty() {
            return true;
        }
        let document = snapshot.to_document();
        self.criteria.iter().all(|c| c.matches(&document))
    }
}
