//! LMDB-backed object store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep buckets and objects in
//! a memory-mapped file, so a cache survives process restarts.
//!
//! # Layout
//!
//! - `containers` database: bucket name -> locality hint (empty when none)
//! - `objects` database: `{bucket}\0{object_key}` -> body
//!
//! Since bucket names never contain NUL, every bucket occupies one contiguous,
//! sorted key range and listings are plain range scans.

use std::ops::Bound;
use std::path::Path;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use redis3_core::StorageError;

use crate::traits::{ListPage, ObjectStore, Provisioned, StatsRecorder, StoreStats};

/// Byte separating the bucket name from the object key.
const SEPARATOR: u8 = 0x00;

/// Largest page a single listing call returns.
pub const MAX_LIST_PAGE_SIZE: usize = 1000;

/// Error type for LMDB store operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored key is not valid UTF-8.
    #[error("Corrupt object key: {0}")]
    CorruptKey(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbStoreError> for StorageError {
    fn from(e: LmdbStoreError) -> Self {
        match &e {
            LmdbStoreError::EnvOpen(_) | LmdbStoreError::Io(_) => StorageError::Unavailable {
                reason: e.to_string(),
            },
            _ => StorageError::TransactionFailed {
                reason: e.to_string(),
            },
        }
    }
}

fn txn_error(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

/// LMDB-backed object store.
///
/// # Example
///
/// ```ignore
/// use redis3_storage::{LmdbObjectStore, ObjectStore};
///
/// let store = LmdbObjectStore::open("/tmp/redis3", 256)?;
/// store.create_container("redis3-mycache", None).await?;
/// store.put_object("redis3-mycache", "0/foo", b"bar".to_vec()).await?;
/// ```
pub struct LmdbObjectStore {
    env: Env,
    containers: Database<Bytes, Bytes>,
    objects: Database<Bytes, Bytes>,
    stats: StatsRecorder,
}

impl LmdbObjectStore {
    /// Open (or create) an LMDB object store.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStoreError> {
        let map_size = max_size_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| {
                LmdbStoreError::EnvOpen(format!("map size of {max_size_mb} MB overflows usize"))
            })?;
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let containers: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("containers"))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        let objects: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("objects"))
            .map_err(|e| LmdbStoreError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "LMDB object store opened");

        Ok(Self {
            env,
            containers,
            objects,
            stats: StatsRecorder::default(),
        })
    }

    fn container_exists(&self, container: &str) -> Result<bool, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let found = self
            .containers
            .get(&rtxn, container.as_bytes())
            .map_err(txn_error)?
            .is_some();
        Ok(found)
    }

    fn require_container(&self, container: &str) -> Result<(), StorageError> {
        if self.container_exists(container)? {
            Ok(())
        } else {
            Err(StorageError::rejected(
                "NoSuchBucket",
                format!("The specified bucket does not exist: {container}"),
            ))
        }
    }

    fn scan_page(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, LmdbStoreError> {
        let bucket_prefix = encode_key(container, "");
        let scan_prefix = encode_key(container, prefix);
        let start = match cursor {
            Some(after) => encode_key(container, after),
            None => scan_prefix.clone(),
        };
        let range: (Bound<&[u8]>, Bound<&[u8]>) = match cursor {
            Some(_) => (Bound::Excluded(start.as_slice()), Bound::Unbounded),
            None => (Bound::Included(start.as_slice()), Bound::Unbounded),
        };

        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let iter = self.objects.range(&rtxn, &range).map_err(txn_error)?;

        let mut keys = Vec::with_capacity(page_size.min(64));
        let mut has_more = false;
        for entry in iter {
            let (raw_key, _) = entry.map_err(txn_error)?;
            if !raw_key.starts_with(&scan_prefix) {
                break;
            }
            if keys.len() == page_size {
                has_more = true;
                break;
            }
            let object_key = std::str::from_utf8(&raw_key[bucket_prefix.len()..])
                .map_err(|e| LmdbStoreError::CorruptKey(e.to_string()))?;
            keys.push(object_key.to_string());
        }

        let next_cursor = if has_more { keys.last().cloned() } else { None };
        Ok(ListPage { keys, next_cursor })
    }
}

/// Encode `{bucket}\0{object_key}`.
fn encode_key(container: &str, key: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(container.len() + 1 + key.len());
    bytes.extend_from_slice(container.as_bytes());
    bytes.push(SEPARATOR);
    bytes.extend_from_slice(key.as_bytes());
    bytes
}

#[async_trait]
impl ObjectStore for LmdbObjectStore {
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let exists = self
            .containers
            .get(&wtxn, name.as_bytes())
            .map_err(txn_error)?
            .is_some();
        if exists {
            return Ok(Provisioned::AlreadyOwned);
        }

        let hint = locality_hint.unwrap_or_default();
        self.containers
            .put(&mut wtxn, name.as_bytes(), hint.as_bytes())
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(container = name, "Bucket created");
        Ok(Provisioned::Created)
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.require_container(container)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.objects
            .put(&mut wtxn, &encode_key(container, key), &body)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.stats.record_put();
        Ok(())
    }

    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.require_container(container)?;

        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let body = self
            .objects
            .get(&rtxn, &encode_key(container, key))
            .map_err(txn_error)?
            .map(<[u8]>::to_vec);

        self.stats.record_get(body.is_some());
        Ok(body)
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        self.require_container(container)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.objects
            .delete(&mut wtxn, &encode_key(container, key))
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;

        self.stats.record_delete();
        Ok(())
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StorageError> {
        self.require_container(container)?;

        let page_size = page_size.clamp(1, MAX_LIST_PAGE_SIZE);
        let page = self.scan_page(container, prefix, cursor, page_size)?;
        self.stats.record_list_page();
        Ok(page)
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        Ok(self.stats.snapshot())
    }
}
