//! In-memory object store.
//!
//! Buckets are `BTreeMap`s so listings come back in key order, the same way
//! an object storage listing does. Useful for tests and local runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::RwLock;

use async_trait::async_trait;
use redis3_core::StorageError;

use crate::traits::{ListPage, ObjectStore, Provisioned, StatsRecorder, StoreStats};

/// Largest page a single listing call returns, whatever the caller asks for.
pub const MAX_LIST_PAGE_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct Bucket {
    locality_hint: Option<String>,
    objects: BTreeMap<String, Vec<u8>>,
}

/// Object store keeping every bucket in process memory.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    buckets: RwLock<HashMap<String, Bucket>>,
    /// Bucket names that exist but belong to another account.
    foreign: RwLock<HashSet<String>>,
    max_page_size: usize,
    stats: StatsRecorder,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::with_max_page_size(MAX_LIST_PAGE_SIZE)
    }

    /// Create a store whose listings never return more than `max_page_size` keys.
    pub fn with_max_page_size(max_page_size: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            foreign: RwLock::new(HashSet::new()),
            max_page_size: max_page_size.max(1),
            stats: StatsRecorder::default(),
        }
    }

    /// Register a bucket name as owned by someone else.
    ///
    /// Provisioning that name afterwards fails with `BucketAlreadyExists`.
    pub fn with_foreign_container(self, name: impl Into<String>) -> Self {
        if let Ok(mut foreign) = self.foreign.write() {
            foreign.insert(name.into());
        }
        self
    }

    /// Names of the buckets provisioned in this store.
    pub fn container_names(&self) -> Vec<String> {
        self.buckets
            .read()
            .map(|buckets| {
                let mut names: Vec<String> = buckets.keys().cloned().collect();
                names.sort();
                names
            })
            .unwrap_or_default()
    }

    /// Locality hint a bucket was provisioned with.
    pub fn locality_hint(&self, container: &str) -> Option<String> {
        self.buckets
            .read()
            .ok()
            .and_then(|buckets| buckets.get(container).and_then(|b| b.locality_hint.clone()))
    }

    /// Number of objects in a bucket (0 for unknown buckets).
    pub fn object_count(&self, container: &str) -> usize {
        self.buckets
            .read()
            .ok()
            .and_then(|buckets| buckets.get(container).map(|b| b.objects.len()))
            .unwrap_or(0)
    }
}

fn no_such_bucket(container: &str) -> StorageError {
    StorageError::rejected(
        "NoSuchBucket",
        format!("The specified bucket does not exist: {container}"),
    )
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_container(
        &self,
        name: &str,
        locality_hint: Option<&str>,
    ) -> Result<Provisioned, StorageError> {
        let foreign = self.foreign.read().map_err(|_| StorageError::LockPoisoned)?;
        if foreign.contains(name) {
            return Err(StorageError::rejected(
                "BucketAlreadyExists",
                format!("The requested bucket name is not available: {name}"),
            ));
        }
        drop(foreign);

        let mut buckets = self.buckets.write().map_err(|_| StorageError::LockPoisoned)?;
        if buckets.contains_key(name) {
            return Ok(Provisioned::AlreadyOwned);
        }
        buckets.insert(
            name.to_string(),
            Bucket {
                locality_hint: locality_hint.map(str::to_string),
                objects: BTreeMap::new(),
            },
        );
        tracing::debug!(container = name, "Bucket created");
        Ok(Provisioned::Created)
    }

    async fn put_object(
        &self,
        container: &str,
        key: &str,
        body: Vec<u8>,
    ) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().map_err(|_| StorageError::LockPoisoned)?;
        let bucket = buckets
            .get_mut(container)
            .ok_or_else(|| no_such_bucket(container))?;
        bucket.objects.insert(key.to_string(), body);
        self.stats.record_put();
        Ok(())
    }

    async fn get_object(
        &self,
        container: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        let buckets = self.buckets.read().map_err(|_| StorageError::LockPoisoned)?;
        let bucket = buckets
            .get(container)
            .ok_or_else(|| no_such_bucket(container))?;
        let body = bucket.objects.get(key).cloned();
        self.stats.record_get(body.is_some());
        Ok(body)
    }

    async fn delete_object(&self, container: &str, key: &str) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().map_err(|_| StorageError::LockPoisoned)?;
        let bucket = buckets
            .get_mut(container)
            .ok_or_else(|| no_such_bucket(container))?;
        bucket.objects.remove(key);
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
        let page_size = page_size.clamp(1, self.max_page_size);
        let buckets = self.buckets.read().map_err(|_| StorageError::LockPoisoned)?;
        let bucket = buckets
            .get(container)
            .ok_or_else(|| no_such_bucket(container))?;

        let start = match cursor {
            Some(after) => Bound::Excluded(after),
            None => Bound::Included(prefix),
        };
        let mut matching = bucket
            .objects
            .range::<str, _>((start, Bound::Unbounded))
            .map(|(key, _)| key)
            .skip_while(|key| key.as_str() < prefix)
            .take_while(|key| key.starts_with(prefix));

        let keys: Vec<String> = matching.by_ref().take(page_size).cloned().collect();
        let next_cursor = match matching.next() {
            Some(_) => keys.last().cloned(),
            None => None,
        };
        self.stats.record_list_page();

        Ok(ListPage { keys, next_cursor })
    }

    async fn stats(&self) -> Result<StoreStats, StorageError> {
        Ok(self.stats.snapshot())
    }
}
