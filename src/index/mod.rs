//! Secondary indexes over live snapshots.

mod category_index;

pub use category_index::{CategoryIndex, IndexKey};
