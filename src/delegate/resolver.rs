use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SnapshotStoreConfig;
use crate::error::StoreError;
use crate::snapshot::Snapshot;

use super::source::{DataSource, SourceError};

/// Consecutive failures after which a real source is considered unavailable.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Shortest wait granted to one attempt, however little of the budget is left.
const MIN_ATTEMPT_WAIT: Duration = Duration::from_millis(100);

/// The source chosen for a config.
#[derive(Clone)]
pub struct Resolution {
    pub source_name: String,
    pub source: Arc<dyn DataSource>,
    pub simulated: bool,
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("source_name", &self.source_name)
            .field("simulated", &self.simulated)
            .finish()
    }
}

/// Outcome of one data-source attempt.
enum Attempt<T> {
    Done(Result<T, SourceError>),
    TimedOut(Duration),
}

struct CachedResolution {
    resolution: Resolution,
    resolved_at: Instant,
}

/// Chooses between the registered real sources and the simulated source.
///
/// Resolutions are cached per `cacheKey` for `maxAge`. A resolution older than
/// that but within `staleWhileRevalidate` is still returned, and a background
/// thread revalidates it (probing unavailable sources with `health_check`).
///
/// Clone-friendly: clones share failure counts and the cache.
#[derive(Clone)]
pub struct DelegateResolver {
    sources: Arc<Vec<Arc<dyn DataSource>>>,
    simulated: Arc<dyn DataSource>,
    failures: Arc<Mutex<HashMap<String, u32>>>,
    cache: Arc<Mutex<HashMap<String, CachedResolution>>>,
    refreshing: Arc<Mutex<HashSet<String>>>,
    failure_threshold: u32,
}

impl DelegateResolver {
    pub fn new(simulated: Arc<dyn DataSource>) -> Self {
        Self {
            sources: Arc::new(Vec::new()),
            simulated,
            failures: Arc::new(Mutex::new(HashMap::new())),
            cache: Arc::new(Mutex::new(HashMap::new())),
            refreshing: Arc::new(Mutex::new(HashSet::new())),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
        }
    }

    /// Register a real source under its `name()`. Registration order is the
    /// fallback order when a config has no delegate list.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        Arc::make_mut(&mut self.sources).push(source);
        self
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Resolve the source for `config`, using the cache when possible.
    pub fn resolve(&self, config: &SnapshotStoreConfig) -> Resolution {
        let key = config.cache_key().to_string();
        let max_age = config.cache.max_age();
        let stale_limit = config.cache.stale_limit();

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = cache.get(&key) {
                let age = cached.resolved_at.elapsed();
                if age < max_age {
                    return cached.resolution.clone();
                }
                if age < stale_limit {
                    let resolution = cached.resolution.clone();
                    drop(cache);
                    self.schedule_refresh(config, key);
                    return resolution;
                }
            }
        }

        let resolution = self.decide(config);
        self.store(&key, resolution.clone());
        resolution
    }

    /// Whether the named source is still below the failure threshold.
    pub fn is_available(&self, name: &str) -> bool {
        let failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.get(name).copied().unwrap_or(0) < self.failure_threshold
    }

    pub fn record_success(&self, name: &str) {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        failures.remove(name);
    }

    /// Count a failure; at the threshold the source is marked unavailable and
    /// every cached resolution pointing at it is dropped.
    pub fn record_failure(&self, name: &str) {
        let count = {
            let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
            let count = failures.entry(name.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        if count == self.failure_threshold {
            warn!(source = %name, failures = count, "Data source marked unavailable");
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.retain(|_, cached| cached.resolution.source_name != name);
        }
    }

    pub fn invalidate(&self, config: &SnapshotStoreConfig) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.remove(config.cache_key());
    }

    /// Fetch `id` through the resolved source, retrying transient failures and
    /// falling back to the simulated source once retries are exhausted.
    ///
    /// The whole call is bounded by `retryDelay × maxRetries`; a source that
    /// does not answer in time counts as a failure.
    pub fn fetch(
        &self,
        config: &SnapshotStoreConfig,
        store_id: &str,
        id: &str,
    ) -> Result<Value, StoreError> {
        let (store_id, id) = (store_id.to_string(), id.to_string());
        self.call(config, move |source| source.fetch(&store_id, &id))
    }

    /// Push a snapshot through the resolved source, with the same retry policy.
    pub fn push(
        &self,
        config: &SnapshotStoreConfig,
        store_id: &str,
        snapshot: &Snapshot,
    ) -> Result<(), StoreError> {
        let store_id = store_id.to_string();
        let snapshot = snapshot.clone();
        self.call(config, move |source| source.push(&store_id, &snapshot))
    }

    fn call<T, F>(&self, config: &SnapshotStoreConfig, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: Fn(&dyn DataSource) -> Result<T, SourceError> + Send + Sync + 'static,
    {
        let op = Arc::new(op);
        let delay = config.retry.delay();
        let budget = config.retry.budget();
        // No deadline when no retries are configured or the budget is unrepresentable.
        let deadline = if budget.is_zero() {
            None
        } else {
            Instant::now().checked_add(budget)
        };
        let mut slept = Duration::ZERO;
        let mut last_reason = String::from("no attempt made");
        let mut last_simulated = false;

        for attempt in 0..=config.retry.max_retries {
            let resolution = self.resolve(config);
            last_simulated = resolution.simulated;

            match Self::attempt(&resolution.source, &op, deadline) {
                Attempt::Done(Ok(value)) => {
                    if !resolution.simulated {
                        self.record_success(&resolution.source_name);
                    }
                    return Ok(value);
                }
                Attempt::Done(Err(SourceError::Unavailable(reason))) => {
                    warn!(
                        source = %resolution.source_name,
                        attempt = attempt + 1,
                        reason = %reason,
                        "Data source call failed"
                    );
                    if !resolution.simulated {
                        self.record_failure(&resolution.source_name);
                    }
                    last_reason = reason;
                }
                Attempt::Done(Err(other)) => return Err(other.into()),
                Attempt::TimedOut(waited) => {
                    warn!(
                        source = %resolution.source_name,
                        attempt = attempt + 1,
                        waited_ms = waited.as_millis() as u64,
                        "Data source call timed out"
                    );
                    if !resolution.simulated {
                        self.record_failure(&resolution.source_name);
                    }
                    last_reason = format!("no response within {:?}", waited);
                    break;
                }
            }

            if attempt < config.retry.max_retries {
                if slept.saturating_add(delay) > budget {
                    break;
                }
                thread::sleep(delay);
                slept += delay;
            }
        }

        if last_simulated {
            return Err(StoreError::SourceUnavailable(last_reason));
        }

        warn!(reason = %last_reason, "Retries exhausted, falling back to simulated data source");
        (*op)(self.simulated.as_ref()).map_err(|err| match err {
            SourceError::Unavailable(reason) => StoreError::SourceUnavailable(format!(
                "{} (simulated fallback: {})",
                last_reason, reason
            )),
            other => other.into(),
        })
    }

    /// Run `op` against `source`, waiting until `deadline` (but at least
    /// `MIN_ATTEMPT_WAIT`). A call that outlives the wait is abandoned to its
    /// thread and its result dropped.
    fn attempt<T, F>(
        source: &Arc<dyn DataSource>,
        op: &Arc<F>,
        deadline: Option<Instant>,
    ) -> Attempt<T>
    where
        T: Send + 'static,
        F: Fn(&dyn DataSource) -> Result<T, SourceError> + Send + Sync + 'static,
    {
        let Some(deadline) = deadline else {
            return Attempt::Done((**op)(source.as_ref()));
        };

        let wait = deadline
            .saturating_duration_since(Instant::now())
            .max(MIN_ATTEMPT_WAIT);
        let (tx, rx) = mpsc::channel();
        let source = Arc::clone(source);
        let op = Arc::clone(op);
        thread::spawn(move || {
            // The receiver is gone once the caller stopped waiting.
            let _ = tx.send((*op)(source.as_ref()));
        });

        match rx.recv_timeout(wait) {
            Ok(result) => Attempt::Done(result),
            Err(RecvTimeoutError::Timeout) => Attempt::TimedOut(wait),
            Err(RecvTimeoutError::Disconnected) => {
                Attempt::Done(Err(SourceError::Unavailable("data source panicked".into())))
            }
        }
    }

    fn decide(&self, config: &SnapshotStoreConfig) -> Resolution {
        if config.use_simulated_data_source {
            return self.simulated_resolution();
        }

        let candidates: Vec<(String, bool)> = if config.delegate.is_empty() {
            self.sources
                .iter()
                .map(|s| (s.name().to_string(), false))
                .collect()
        } else {
            config
                .delegate
                .iter()
                .map(|d| (d.source.clone(), d.use_simulated_data_source))
                .collect()
        };

        for (name, use_simulated) in candidates {
            if use_simulated {
                return self.simulated_resolution();
            }
            if !self.is_available(&name) {
                continue;
            }
            if let Some(source) = self.sources.iter().find(|s| s.name() == name) {
                return Resolution {
                    source_name: name,
                    source: Arc::clone(source),
                    simulated: false,
                };
            }
        }

        self.simulated_resolution()
    }

    fn simulated_resolution(&self) -> Resolution {
        Resolution {
            source_name: self.simulated.name().to_string(),
            source: Arc::clone(&self.simulated),
            simulated: true,
        }
    }

    fn store(&self, key: &str, resolution: Resolution) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.insert(
            key.to_string(),
            CachedResolution {
                resolution,
                resolved_at: Instant::now(),
            },
        );
    }

    fn schedule_refresh(&self, config: &SnapshotStoreConfig, key: String) {
        {
            let mut refreshing = self.refreshing.lock().unwrap_or_else(PoisonError::into_inner);
            if !refreshing.insert(key.clone()) {
                return;
            }
        }

        let resolver = self.clone();
        let config = config.clone();
        thread::spawn(move || {
            resolver.revalidate(&config, &key);
            let mut refreshing = resolver
                .refreshing
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            refreshing.remove(&key);
        });
    }

    fn revalidate(&self, config: &SnapshotStoreConfig, key: &str) {
        for source in self.sources.iter() {
            if !self.is_available(source.name()) && source.health_check().is_ok() {
                debug!(source = %source.name(), "Data source recovered");
                self.record_success(source.name());
            }
        }

        let resolution = self.decide(config);
        debug!(cache_key = %key, source = %resolution.source_name, "Delegate resolution refreshed");
        self.store(key, resolution);
    }
}
