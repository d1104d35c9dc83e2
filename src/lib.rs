pub mod clustering;
pub mod config;
pub mod embeddings;
pub mod errors;
pub mod io;
pub mod item_index;
pub mod metrics;

pub use errors::{MetricError, Result};
pub use item_index::{map_to_indices, ItemIndex};
