//! The snapshot store façade.

mod diff;
mod filter;
mod state;
#[allow(clippy::module_inception)]
mod store;

pub use diff::{diff_snapshots, FieldDiff};
pub use filter::SnapshotFilter;
pub use store::SnapshotStore;
