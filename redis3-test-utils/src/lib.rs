//! redis3 Test Utilities
//!
//! Shared test infrastructure for the redis3 workspace:
//! - Proptest generators for keys, values and batches
//! - Store wrappers that inject faults, latency, or bad listings
//! - Fixtures for provisioned stores and client configs

pub use redis3_core::{ClientConfig, DbNumber, StorageError};
pub use redis3_storage::{
    InMemoryObjectStore, ListPage, LmdbObjectStore, ObjectStore, Provisioned, StoreStats,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cache keys and values.

    use proptest::prelude::*;

    /// A user key: non-empty, printable, may contain `/` and `:`.
    pub fn arb_key() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_:./-]{1,24}"
    }

    /// An arbitrary UTF-8 value, empty included.
    pub fn arb_value() -> impl Strategy<Value = String> {
        ".{0,64}"
    }

    /// Up to `max_len` distinct keys with one value each, in arbitrary order.
    pub fn arb_unique_batch(max_len: usize) -> impl Strategy<Value = (Vec<String>, Vec<String>)> {
        prop::collection::btree_map(arb_key(), arb_value(), 0..=max_len)
            .prop_flat_map(|pairs| Just(pairs.into_iter().collect::<Vec<_>>()).prop_shuffle())
            .prop_map(|pairs| pairs.into_iter().unzip())
    }

    /// A per-item delay in milliseconds, for jittering completion order.
    pub fn arb_delay_ms() -> impl Strategy<Value = u64> {
        0u64..50
    }

    /// A database number in a realistic range.
    pub fn arb_db() -> impl Strategy<Value = i64> {
        0i64..1000
    }
}

// ============================================================================
// STORE WRAPPERS
// ============================================================================

/// Which backend call a fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultOp {
    Create,
    Put,
    Get,
    Delete,
    List,
}

#[derive(Debug, Clone)]
struct Fault {
    op: FaultOp,
    /// Object key (or listing prefix) the fault is limited to; `None` matches all.
    target: Option<String>,
    error: StorageError,
}

/// Wraps a store and fails selected calls with a chosen [`StorageError`].
#[derive(Debug)]
pub struct FaultyStore<S> {
    inner: S,
    faults: Vec<Fault>,
}

impl<S: ObjectStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Vec::new(),
        }
    }

    /// Fail `op` on exactly `object_key`.
    pub fn fail_key(mut self, op: FaultOp, object_key: impl Into<String>, error: StorageError) -> Self {
        self.faults.push(Fault {
            op,
            target: Some(object_key.into()),
            error,
        });
        self
    }

    /// Fail every `op` call.
    pub fn fail_all(mut self, op: FaultOp, error: StorageError) -> Self {
        self.faults.push(Fault {
            op,
            target: None,
            error,
        });
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, op: FaultOp, target: &str) -> Result<(), StorageError> {
        match self
            .faults
            .iter()
            .find(|f| f.op == op && f.target.as_deref().map_or(true, |t| t == target))
        {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for FaultyStore<S> {
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError> {
        self.check(FaultOp::Create, name)?;
        self.inner.create_container(name, locality_hint).await
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.check(FaultOp::Put, key)?;
        self.inner.put_object(container, key, body).await
    }

    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.check(FaultOp::Get, key)?;
        self.inner.get_object(container, key).await
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        self.check(FaultOp::Delete, key)?;
        self.inner.delete_object(container, key).await
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StorageError> {
        self.check(FaultOp::List, prefix)?;
        self.inner
            .list_objects(container, prefix, cursor, page_size)
            .await
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        self.inner.stats().await
    }
}

/// Wraps a store and delays object calls per key, recording completion order.
///
/// Meant for runtimes with paused time, where the delays resolve instantly
/// but still in deadline order.
#[derive(Debug)]
pub struct LatencyStore<S> {
    inner: S,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    completed: Mutex<Vec<String>>,
}

impl<S: ObjectStore> LatencyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            delays: HashMap::new(),
            default_delay: Duration::ZERO,
            completed: Mutex::new(Vec::new()),
        }
    }

    /// Delay calls on `object_key` by `delay`.
    pub fn with_delay(mut self, object_key: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(object_key.into(), delay);
        self
    }

    /// Delay for object keys without a specific delay.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    /// Object keys in the order their calls finished.
    pub fn completion_order(&self) -> Vec<String> {
        self.completed
            .lock()
            .map(|completed| completed.clone())
            .unwrap_or_default()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn pause(&self, key: &str) {
        let delay = self.delays.get(key).copied().unwrap_or(self.default_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn record(&self, key: &str) {
        if let Ok(mut completed) = self.completed.lock() {
            completed.push(key.to_string());
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for LatencyStore<S> {
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError> {
        self.inner.create_container(name, locality_hint).await
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.pause(key).await;
        let result = self.inner.put_object(container, key, body).await;
        self.record(key);
        result
    }

    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.pause(key).await;
        let result = self.inner.get_object(container, key).await;
        self.record(key);
        result
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        self.pause(key).await;
        let result = self.inner.delete_object(container, key).await;
        self.record(key);
        result
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StorageError> {
        self.inner
            .list_objects(container, prefix, cursor, page_size)
            .await
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        self.inner.stats().await
    }
}

/// Wraps a store and appends a foreign object key to the first listing page.
#[derive(Debug)]
pub struct RogueListingStore<S> {
    inner: S,
    rogue_key: String,
}

impl<S: ObjectStore> RogueListingStore<S> {
    pub fn new(inner: S, rogue_key: impl Into<String>) -> Self {
        Self {
            inner,
            rogue_key: rogue_key.into(),
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RogueListingStore<S> {
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError> {
        self.inner.create_container(name, locality_hint).await
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.inner.put_object(container, key, body).await
    }

    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get_object(container, key).await
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        self.inner.delete_object(container, key).await
    }

    async fn list_objects(
        &self,
        container: &str,
        prefix: &str,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<ListPage, StorageError> {
        let mut page = self
            .inner
            .list_objects(container, prefix, cursor, page_size)
            .await?;
        if cursor.is_none() {
            page.keys.push(self.rogue_key.clone());
        }
        Ok(page)
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        self.inner.stats().await
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built stores and configs for common testing scenarios.

    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Config for `cache_name` with listing pages of `page_size` keys.
    pub fn paged_config(cache_name: &str, page_size: usize) -> ClientConfig {
        ClientConfig::new(cache_name).with_list_page_size(page_size)
    }

    pub fn memory_store() -> Arc<InMemoryObjectStore> {
        Arc::new(InMemoryObjectStore::new())
    }

    /// LMDB store in a fresh temporary directory.
    ///
    /// Keep the returned `TempDir` alive for as long as the store is used.
    pub fn lmdb_store() -> (TempDir, Arc<LmdbObjectStore>) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = LmdbObjectStore::open(dir.path(), 16).expect("Failed to open LMDB store");
        (dir, Arc::new(store))
    }

    /// `count` keys `{prefix}{i}` with values `value_{i}`.
    pub fn numbered_pairs(prefix: &str, count: usize) -> (Vec<String>, Vec<String>) {
        (0..count)
            .map(|i| (format!("{prefix}{i}"), format!("value_{i}")))
            .unzip()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BUCKET: &str = "redis3-utils";

    #[tokio::test]
    async fn test_faulty_store_fails_only_target() {
        let store = FaultyStore::new(InMemoryObjectStore::new()).fail_key(
            FaultOp::Put,
            "0/bad",
            StorageError::unavailable("reset"),
        );
        store.create_container(BUCKET, None).await.expect("create");

        store
            .put_object(BUCKET, "0/good", Vec::new())
            .await
            .expect("untargeted put");
        assert_eq!(
            store.put_object(BUCKET, "0/bad", Vec::new()).await,
            Err(StorageError::unavailable("reset"))
        );
        assert_eq!(store.inner().object_count(BUCKET), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_store_records_completion_order() {
        let store = LatencyStore::new(InMemoryObjectStore::new())
            .with_delay("0/slow", Duration::from_millis(30))
            .with_delay("0/fast", Duration::from_millis(5));
        store.create_container(BUCKET, None).await.expect("create");

        let slow = store.put_object(BUCKET, "0/slow", Vec::new());
        let fast = store.put_object(BUCKET, "0/fast", Vec::new());
        let (a, b) = tokio::join!(slow, fast);
        a.expect("slow put");
        b.expect("fast put");

        assert_eq!(store.completion_order(), vec!["0/fast", "0/slow"]);
    }

    #[tokio::test]
    async fn test_rogue_listing_only_on_first_page() {
        let store = RogueListingStore::new(InMemoryObjectStore::new(), "elsewhere/x");
        store.create_container(BUCKET, None).await.expect("create");

        let first = store.list_objects(BUCKET, "0/", None, 10).await.expect("list");
        assert_eq!(first.keys, vec!["elsewhere/x"]);
        let later = store
            .list_objects(BUCKET, "0/", Some("0/a"), 10)
            .await
            .expect("list");
        assert!(later.keys.is_empty());
    }

    proptest! {
        #[test]
        fn prop_unique_batch_has_distinct_aligned_keys((keys, values) in generators::arb_unique_batch(20)) {
            prop_assert_eq!(keys.len(), values.len());
            let mut dedup = keys.clone();
            dedup.sort();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), keys.len());
        }
    }
}
