//! Store configuration.
//!
//! A `SnapshotStoreConfig` is built once when a store is created and handed to
//! the store, which keeps it behind an `Arc`. It deserializes from the host's
//! camelCase options object:
//!
//! ```
//! use snapshot_store::SnapshotStoreConfig;
//!
//! let config = SnapshotStoreConfig::from_json(
//!     r#"{"storeId": "tasks", "category": "work", "maxRetries": 2, "retryDelay": 10}"#,
//! )
//! .unwrap();
//! assert_eq!(config.store_id, "tasks");
//! assert_eq!(config.retry.max_retries, 2);
//! ```

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::snapshot::Category;

/// Comparison applied by a [`Criterion`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriteriaOperator {
    Eq,
    Ne,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
}

/// A single filter predicate: `field operator value`.
///
/// `field` is a dotted path into the JSON form of a snapshot, e.g.
/// `payload.priority` or `metadata.author`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub operator: CriteriaOperator,
    #[serde(default)]
    pub value: Value,
}

impl Criterion {
    pub fn new(field: impl Into<String>, operator: CriteriaOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Evaluate against a JSON document.
    pub fn matches(&self, doc: &Value) -> bool {
        let pointer = format!("/{}", self.field.replace('.', "/"));
        let found = doc.pointer(&pointer).filter(|v| !v.is_null());

        match self.operator {
            CriteriaOperator::Exists => found.is_some(),
            CriteriaOperator::Eq => found == Some(&self.value),
            CriteriaOperator::Ne => found != Some(&self.value),
            CriteriaOperator::Contains => match found {
                Some(Value::String(s)) => self.value.as_str().is_some_and(|needle| s.contains(needle)),
                Some(Value::Array(items)) => items.contains(&self.value),
                _ => false,
            },
            CriteriaOperator::Gt => compare(found, &self.value) == Some(Ordering::Greater),
            CriteriaOperator::Gte => matches!(
                compare(found, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CriteriaOperator::Lt => compare(found, &self.value) == Some(Ordering::Less),
            CriteriaOperator::Lte => matches!(
                compare(found, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
        }
    }
}

fn compare(found: Option<&Value>, expected: &Value) -> Option<Ordering> {
    match (found?, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// One entry of the ordered delegate list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateConfig {
    /// Name of a data source registered on the resolver.
    pub source: String,
    /// Serve this entry from the simulated source instead.
    #[serde(default)]
    pub use_simulated_data_source: bool,
}

impl DelegateConfig {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            use_simulated_data_source: false,
        }
    }

    pub fn simulated(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            use_simulated_data_source: true,
        }
    }
}

/// Retry policy for data-source calls. `retry_delay` is in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: 100,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    /// Upper bound on the total time a data-source call may take, attempts
    /// and waits included. Saturates at `Duration::MAX`.
    pub fn budget(&self) -> Duration {
        self.delay()
            .checked_mul(self.max_retries)
            .unwrap_or(Duration::MAX)
    }
}

/// Cache policy for delegate resolutions. Both values are in seconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CachePolicy {
    pub max_age: u64,
    pub stale_while_revalidate: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_age: 60,
            stale_while_revalidate: 30,
        }
    }
}

impl CachePolicy {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    pub fn stale_while_revalidate(&self) -> Duration {
        Duration::from_secs(self.stale_while_revalidate)
    }

    /// Age past which a cached resolution is no longer served.
    pub fn stale_limit(&self) -> Duration {
        self.max_age().saturating_add(self.stale_while_revalidate())
    }
}

/// Configuration of a single snapshot store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapshotStoreConfig {
    pub store_id: String,
    /// Default category for snapshots taken without one.
    pub category: Option<Category>,
    pub criteria: Vec<Criterion>,
    /// Ordered fallback list consulted by the delegate resolver.
    pub delegate: Vec<DelegateConfig>,
    pub use_simulated_data_source: bool,
    #[serde(flatten)]
    pub retry: RetryPolicy,
    #[serde(flatten)]
    pub cache: CachePolicy,
    pub cache_key: Option<String>,
    /// Leave superseded versions `Active` instead of archiving them on update.
    pub keep_previous_versions_active: bool,
    pub batch_workers: usize,
}

impl Default for SnapshotStoreConfig {
    fn default() -> Self {
        Self {
            store_id: "default".to_string(),
            category: None,
            criteria: Vec::new(),
            delegate: Vec::new(),
            use_simulated_data_source: false,
            retry: RetryPolicy::default(),
            cache: CachePolicy::default(),
            cache_key: None,
            keep_previous_versions_active: false,
            batch_workers: 4,
        }
    }
}

impl SnapshotStoreConfig {
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            ..Self::default()
        }
    }

    /// Parse the host's options object.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_category(mut self, category: impl Into<Category>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_criterion(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    pub fn with_delegate(mut self, delegate: DelegateConfig) -> Self {
        self.delegate.push(delegate);
        self
    }

    pub fn with_simulated_data_source(mut self, enabled: bool) -> Self {
        self.use_simulated_data_source = enabled;
        self
    }

    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.retry = RetryPolicy {
            max_retries,
            retry_delay: retry_delay.as_millis() as u64,
        };
        self
    }

    pub fn with_cache(mut self, max_age: Duration, stale_while_revalidate: Duration) -> Self {
        self.cache = CachePolicy {
            max_age: max_age.as_secs(),
            stale_while_revalidate: stale_while_revalidate.as_secs(),
        };
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_keep_previous_versions_active(mut self, keep: bool) -> Self {
        self.keep_previous_versions_active = keep;
        self
    }

    pub fn with_batch_workers(mut self, workers: usize) -> Self {
        self.batch_workers = workers;
        self
    }

    /// Key under which delegate resolutions are cached.
    pub fn cache_key(&self) -> &str {
        self.cache_key.as_deref().unwrap_or(&self.store_id)
    }
}
