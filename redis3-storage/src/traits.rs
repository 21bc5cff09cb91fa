//! The object storage capability consumed by the client.
//!
//! Implementations map one-to-one onto bucket and object primitives. They do
//! no retries; every failure other than "not found" is reported as a
//! [`StorageError`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redis3_core::StorageError;

/// Outcome of a successful bucket provisioning call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The bucket did not exist and was created.
    Created,
    /// The bucket already existed and belongs to the caller.
    AlreadyOwned,
}

/// One page of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Object keys in lexicographic order.
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` on the last page.
    pub next_cursor: Option<String>,
}

/// Object storage backend trait.
///
/// Implementations must be safe to call concurrently from many tasks; the
/// client fans batch operations out over a shared handle.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a bucket, or confirm that the caller already owns it.
    ///
    /// A bucket that exists but belongs to someone else is an error.
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError>;

    /// Write an object, replacing any previous body.
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Read an object. `Ok(None)` means the object does not exist.
    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError>;

    /// Delete an object. Deleting a missing object succeeds.
    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError>;

    /// List up to `page_size` keys starting with `prefix`, resuming after
    /// `cursor` when given.
    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StorageError>;

    /// Get operation counters.
    async fn stats(&self) -> Result<StoreStats, StorageError>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError> {
        (**self).create_container(name, locality_hint).await
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        (**self).put_object(container, key, body).await
    }

    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).get_object(container, key).await
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        (**self).delete_object(container, key).await
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StorageError> {
        (**self).list_objects(container, prefix, cursor, page_size).await
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        (**self).stats().await
    }
}

/// Snapshot of backend operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub puts: u64,
    pub gets: u64,
    /// Gets that found an object.
    pub hits: u64,
    /// Gets that found nothing.
    pub misses: u64,
    pub deletes: u64,
    pub list_pages: u64,
}

impl StoreStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lock-free counters shared by the bundled backends.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    puts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    deletes: AtomicU64,
    list_pages: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_get(&self, found: bool) {
        if found {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_list_page(&self) {
        self.list_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        StoreStats {
            puts: self.puts.load(Ordering::Relaxed),
            gets: hits + misses,
            hits,
            misses,
            deletes: self.deletes.load(Ordering::Relaxed),
            list_pages: self.list_pages.load(Ordering::Relaxed),
        }
    }
}
