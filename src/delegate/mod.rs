//! Data sources and the resolver that picks between real and simulated ones.
//!
//! Calls out to a [`DataSource`] are the only blocking operations of a store.
//! The [`DelegateResolver`] walks the configured delegate list, skips sources
//! that failed too often, and falls back to the simulated source when nothing
//! real is left.

mod payload;
mod remote;
mod resolver;
mod simulated;
mod source;

pub use payload::{StoreDescriptor, StorePayload};
pub use remote::{RemoteApiClient, RemoteDataSource};
pub use resolver::{DelegateResolver, Resolution, DEFAULT_FAILURE_THRESHOLD};
pub use simulated::SimulatedDataSource;
pub use source::{DataSource, SourceError};
