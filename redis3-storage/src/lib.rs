//! redis3 Storage - Object Store Capability and Backends
//!
//! Defines the bucket/object abstraction the client is written against,
//! plus an in-memory store and an LMDB-backed store.

pub mod lmdb_backend;
pub mod memory;
pub mod traits;

pub use lmdb_backend::{LmdbObjectStore, LmdbStoreError};
pub use memory::InMemoryObjectStore;
pub use traits::{ListPage, ObjectStore, Provisioned, StoreStats};

use std::sync::Arc;

use redis3_core::{BackendConfig, BackendKind, StorageError};

/// Open the backend described by `config`.
///
/// Neither bundled backend takes options, so any entry in `config.options`
/// is rejected instead of being dropped.
pub fn open_store(config: &BackendConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    if let Some(key) = config.options.keys().next() {
        return Err(StorageError::rejected(
            "InvalidConfiguration",
            format!("unrecognised option {key:?} for the {:?} backend", config.kind),
        ));
    }

    match config.kind {
        BackendKind::Memory => Ok(Arc::new(InMemoryObjectStore::new())),
        BackendKind::Lmdb => {
            let path = config.path.as_ref().ok_or_else(|| {
                StorageError::rejected("InvalidConfiguration", "lmdb backend requires a path")
            })?;
            let store = LmdbObjectStore::open(path, config.map_size_mb)?;
            Ok(Arc::new(store))
        }
    }
}
