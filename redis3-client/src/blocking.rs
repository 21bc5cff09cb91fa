//! Synchronous facade over [`Redis3Client`].
//!
//! Owns a current-thread tokio runtime and blocks on each call. Must not be
//! used from inside another tokio runtime.

use std::sync::Arc;

use redis3_core::{ClientConfig, DbNumber, IntoDbNumber, Redis3Error, Redis3Result};
use redis3_storage::ObjectStore;
use tokio::runtime::{Builder, Runtime};

use crate::client::Redis3Client;
use crate::scan::KeyScan;

/// Blocking counterpart of [`Redis3Client`].
pub struct BlockingClient<S: ?Sized = dyn ObjectStore> {
    runtime: Runtime,
    inner: Redis3Client<S>,
}

impl<S: ObjectStore + ?Sized> BlockingClient<S> {
    pub fn connect(store: Arc<S>, config: &ClientConfig) -> Redis3Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(runtime_unavailable)?;
        let inner = runtime.block_on(Redis3Client::connect(store, config))?;
        Ok(Self { runtime, inner })
    }

    pub fn new(store: Arc<S>, cache_name: impl Into<String>) -> Redis3Result<Self> {
        Self::connect(store, &ClientConfig::new(cache_name))
    }

    /// The async client this facade drives.
    pub fn client(&self) -> &Redis3Client<S> {
        &self.inner
    }

    pub fn container_name(&self) -> &str {
        self.inner.container_name()
    }

    pub fn cache_name(&self) -> &str {
        self.inner.cache_name()
    }

    pub fn db(&self) -> DbNumber {
        self.inner.db()
    }

    pub fn select_db(&self, value: impl IntoDbNumber) -> Redis3Result<()> {
        self.inner.select_db(value)
    }

    pub fn is_verbose(&self) -> bool {
        self.inner.is_verbose()
    }

    pub fn set(&self, key: &str, value: &str) -> Redis3Result<bool> {
        self.runtime.block_on(self.inner.set(key, value))
    }

    pub fn set_bytes(&self, key: &str, value: Vec<u8>) -> Redis3Result<bool> {
        self.runtime.block_on(self.inner.set_bytes(key, value))
    }

    pub fn get(&self, key: &str) -> Redis3Result<Option<String>> {
        self.runtime.block_on(self.inner.get(key))
    }

    pub fn get_bytes(&self, key: &str) -> Redis3Result<Option<Vec<u8>>> {
        self.runtime.block_on(self.inner.get_bytes(key))
    }

    pub fn delete(&self, key: &str) -> Redis3Result<bool> {
        self.runtime.block_on(self.inner.delete(key))
    }

    pub fn mset<K, V>(&self, keys: &[K], values: &[V]) -> Redis3Result<Vec<bool>>
    where
        K: AsRef<str> + Sync,
        V: AsRef<str> + Sync,
    {
        self.runtime.block_on(self.inner.mset(keys, values))
    }

    pub fn mget<K>(&self, keys: &[K]) -> Redis3Result<Vec<Option<String>>>
    where
        K: AsRef<str> + Sync,
    {
        self.runtime.block_on(self.inner.mget(keys))
    }

    pub fn mset_outcomes<K, V>(
        &self,
        keys: &[K],
        values: &[V],
    ) -> Redis3Result<Vec<Redis3Result<bool>>>
    where
        K: AsRef<str> + Sync,
        V: AsRef<str> + Sync,
    {
        self.runtime.block_on(self.inner.mset_outcomes(keys, values))
    }

    pub fn mget_outcomes<K>(&self, keys: &[K]) -> Vec<Redis3Result<Option<String>>>
    where
        K: AsRef<str> + Sync,
    {
        self.runtime.block_on(self.inner.mget_outcomes(keys))
    }

    /// Iterate the keys of the current database, one page fetched at a time.
    pub fn keys(&self, prefix_filter: Option<&str>) -> BlockingKeys<'_, S> {
        BlockingKeys {
            runtime: &self.runtime,
            scan: self.inner.keys(prefix_filter),
        }
    }
}

fn runtime_unavailable(error: std::io::Error) -> Redis3Error {
    Redis3Error::RuntimeUnavailable {
        reason: format!("failed to start current-thread runtime: {error}"),
    }
}

/// Blocking iterator over a [`KeyScan`].
pub struct BlockingKeys<'a, S: ?Sized> {
    runtime: &'a Runtime,
    scan: KeyScan<S>,
}

impl<S: ObjectStore + ?Sized> Iterator for BlockingKeys<'_, S> {
    type Item = Redis3Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.scan.next_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis3_core::ErrorKind;
    use redis3_storage::InMemoryObjectStore;

    #[test]
    fn test_blocking_round_trip() {
        let client =
            BlockingClient::new(Arc::new(InMemoryObjectStore::new()), "sync").expect("connect");

        assert!(client.set("foo", "bar").expect("set"));
        assert_eq!(client.get("foo").expect("get").as_deref(), Some("bar"));
        assert!(client.delete("foo").expect("delete"));
        assert_eq!(client.get("foo").expect("get"), None);
    }

    #[test]
    fn test_blocking_keys_iterates_pages() {
        let config = ClientConfig::new("sync").with_list_page_size(2);
        let client =
            BlockingClient::connect(Arc::new(InMemoryObjectStore::new()), &config).expect("connect");
        let keys: Vec<String> = (0..5).map(|i| format!("k{i}")).collect();
        client.mset(&keys, &keys).expect("mset");

        let listed: Vec<String> = client
            .keys(None)
            .collect::<Result<_, _>>()
            .expect("keys");
        assert_eq!(listed, keys);
    }

    #[test]
    fn test_runtime_build_failure_maps_to_runtime_unavailable() {
        let err = runtime_unavailable(std::io::Error::new(
            std::io::ErrorKind::Other,
            "too many open files",
        ));
        assert_eq!(err.kind(), ErrorKind::RuntimeUnavailable);
        assert!(err.to_string().contains("too many open files"));
    }

    #[test]
    fn test_blocking_select_db() {
        let client =
            BlockingClient::new(Arc::new(InMemoryObjectStore::new()), "sync").expect("connect");
        let err = client.select_db("ciao").expect_err("invalid");
        assert_eq!(err.kind(), ErrorKind::InvalidDatabaseNumber);
        client.select_db("100").expect("valid");
        assert_eq!(client.db(), DbNumber::new(100));
    }
}
