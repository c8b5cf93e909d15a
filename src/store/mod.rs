//! Local persistence for cached collections.
//!
//! One JSON file per cache key under a cache directory, with a per-key
//! watch channel so readers can observe every write as it lands. The
//! storage format is an implementation detail of this module; the engine
//! only sees `observe` / `read_once` / `apply_plan`.

pub mod collection;

pub use collection::CollectionStore;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A live read ended without producing a value (store dropped).
    #[error("cache observation closed")]
    Closed,
}
