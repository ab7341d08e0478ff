//! Batched take/fetch/update with per-item isolation.

mod cancel;
mod coordinator;
mod result;

pub use cancel::CancellationToken;
pub use coordinator::BatchCoordinator;
pub use result::{BatchFailure, BatchItem, BatchResult, TakeItem, UpdateItem};
