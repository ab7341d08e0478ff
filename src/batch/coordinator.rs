use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::debug;

use crate::error::StoreError;
use crate::snapshot::Snapshot;
use crate::subscriber::{panic_message, BatchEvent, BatchOperation, SubscriberRegistry};

use super::cancel::CancellationToken;
use super::result::{BatchFailure, BatchItem, BatchResult};

type Slot = Mutex<Option<Result<Snapshot, StoreError>>>;

/// Runs multi-item operations with per-item isolation.
///
/// A batch is validated up front (`InvalidBatch` rejects it before anything
/// runs), then its items are spread over at most `workers` scoped threads.
/// Subscribers of the store get `Requested` before the first item,
/// `Succeeded` after the last one, and `Failed` as well when any item failed.
pub struct BatchCoordinator {
    store_id: String,
    registry: Arc<SubscriberRegistry>,
    workers: usize,
}

impl BatchCoordinator {
    pub fn new(store_id: impl Into<String>, registry: Arc<SubscriberRegistry>, workers: usize) -> Self {
        Self {
            store_id: store_id.into(),
            registry,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` once per item.
    ///
    /// Per-item errors and panics are captured in the result; the only error
    /// returned is `InvalidBatch` (or `LockPoisoned` from the registry).
    pub fn run<T, F>(
        &self,
        operation: BatchOperation,
        items: &[T],
        cancel: &CancellationToken,
        op: F,
    ) -> Result<BatchResult, StoreError>
    where
        T: BatchItem + Sync,
        F: Fn(&T) -> Result<Snapshot, StoreError> + Sync,
    {
        validate(items)?;

        let ids: Vec<String> = items.iter().map(|item| item.id().to_string()).collect();
        self.registry.notify_batch(
            &self.store_id,
            BatchEvent::Requested {
                operation,
                ids: ids.clone(),
            },
        )?;

        let slots: Vec<Slot> = items.iter().map(|_| Mutex::new(None)).collect();
        let cursor = AtomicUsize::new(0);
        let workers = self.workers.min(items.len());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::SeqCst);
                    let Some(item) = items.get(index) else {
                        break;
                    };

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| op(item)))
                        .unwrap_or_else(|payload| {
                            Err(StoreError::Panicked(panic_message(payload.as_ref())))
                        });
                    *slots[index].lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
                });
            }
        });

        let mut result = BatchResult::default();
        for (id, slot) in ids.into_iter().zip(slots) {
            match slot.into_inner().unwrap_or_else(PoisonError::into_inner) {
                Some(Ok(snapshot)) => result.succeeded.push(snapshot),
                Some(Err(reason)) => result.failed.push(BatchFailure { id, reason }),
                None => result.failed.push(BatchFailure {
                    id,
                    reason: StoreError::Cancelled,
                }),
            }
        }

        debug!(
            store_id = %self.store_id,
            operation = operation.as_str(),
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Batch completed"
        );

        self.registry.notify_batch(
            &self.store_id,
            BatchEvent::Succeeded {
                operation,
                snapshots: result.succeeded.clone(),
            },
        )?;
        if !result.failed.is_empty() {
            self.registry.notify_batch(
                &self.store_id,
                BatchEvent::Failed {
                    operation,
                    failures: result.failed.clone(),
                },
            )?;
        }

        Ok(result)
    }
}

fn validate<T: BatchItem>(items: &[T]) -> Result<(), StoreError> {
    if items.is_empty() {
        return Err(StoreError::InvalidBatch("batch is empty".into()));
    }

    let mut seen = HashSet::new();
    for (position, item) in items.iter().enumerate() {
        let id = item.id();
        if id.trim().is_empty() {
            return Err(StoreError::InvalidBatch(format!(
                "item {} has a blank id",
                position
            )));
        }
        if !seen.insert(id) {
            return Err(StoreError::InvalidBatch(format!("duplicate id {}", id)));
        }
    }
    Ok(())
}
