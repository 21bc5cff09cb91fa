//! Async command surface over one cache bucket.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use redis3_core::{
    object_key, ClientConfig, DbNumber, IntoDbNumber, Redis3Error, Redis3Result, StorageError,
    ValidationError,
};
use redis3_storage::{ObjectStore, Provisioned};

use crate::batch::{ordered_fan_out, settle};
use crate::scan::KeyScan;

/// Emit a diagnostic at `info` for verbose clients and at `debug` otherwise.
macro_rules! diag {
    ($verbose:expr, $($arg:tt)+) => {
        if $verbose {
            tracing::info!($($arg)+)
        } else {
            tracing::debug!($($arg)+)
        }
    };
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Key-value client bound to one cache bucket.
///
/// The current database number can be changed with [`select_db`] while other
/// calls are in flight. Each operation reads it once when it starts, so a
/// batch never spans two databases.
///
/// [`select_db`]: Redis3Client::select_db
pub struct Redis3Client<S: ?Sized = dyn ObjectStore> {
    store: Arc<S>,
    cache_name: String,
    container: String,
    db: AtomicI64,
    verbose: bool,
    batch_concurrency: usize,
    list_page_size: usize,
}

impl<S: ObjectStore + ?Sized> Redis3Client<S> {
    /// Provision the bucket for `config.cache_name` and return a client bound to it.
    ///
    /// A bucket already owned by the caller counts as success; every other
    /// provisioning failure is [`Redis3Error::ProvisioningFailed`].
    pub async fn connect(store: Arc<S>, config: &ClientConfig) -> Redis3Result<Self> {
        let container = config.container_name();
        let started = Instant::now();

        let provisioned = store
            .create_container(&container, config.locality_hint.as_deref())
            .await
            .map_err(|source| {
                tracing::warn!(container = %container, error = %source, "Bucket provisioning failed");
                Redis3Error::ProvisioningFailed {
                    container: container.clone(),
                    source,
                }
            })?;

        diag!(
            config.verbose,
            container = %container,
            created = matches!(provisioned, Provisioned::Created),
            elapsed_ms = elapsed_ms(started),
            "Bucket ready"
        );

        Ok(Self {
            store,
            cache_name: config.cache_name.clone(),
            container,
            db: AtomicI64::new(config.db.get()),
            verbose: config.verbose,
            batch_concurrency: config.batch_concurrency.max(1),
            list_page_size: config.list_page_size.max(1),
        })
    }

    /// Connect with every setting except the cache name defaulted.
    pub async fn new(store: Arc<S>, cache_name: impl Into<String>) -> Redis3Result<Self> {
        Self::connect(store, &ClientConfig::new(cache_name)).await
    }

    /// Bucket backing this cache.
    pub fn container_name(&self) -> &str {
        &self.container
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Database number new operations will use.
    pub fn db(&self) -> DbNumber {
        DbNumber::new(self.db.load(Ordering::SeqCst))
    }

    /// Switch the current database.
    ///
    /// The value is validated first; on failure the current database is left
    /// untouched.
    pub fn select_db(&self, value: impl IntoDbNumber) -> Redis3Result<()> {
        let db = value.into_db_number()?;
        let previous = self.db.swap(db.get(), Ordering::SeqCst);
        diag!(self.verbose, container = %self.container, from = previous, to = %db, "Database selected");
        Ok(())
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Underlying object store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Store `value` under `key` in the current database.
    pub async fn set(&self, key: &str, value: &str) -> Redis3Result<bool> {
        self.put_at(self.db(), key, value.as_bytes().to_vec()).await
    }

    /// Store raw bytes under `key`. [`get`](Self::get) only reads them back if
    /// they are valid UTF-8.
    pub async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Redis3Result<bool> {
        self.put_at(self.db(), key, value).await
    }

    /// Read the value stored under `key`, or `None` when absent.
    pub async fn get(&self, key: &str) -> Redis3Result<Option<String>> {
        self.get_string_at(self.db(), key).await
    }

    pub async fn get_bytes(&self, key: &str) -> Redis3Result<Option<Vec<u8>>> {
        self.get_at(self.db(), key).await
    }

    /// Remove `key`. Deleting an absent key also returns `true`.
    pub async fn delete(&self, key: &str) -> Redis3Result<bool> {
        let db = self.db();
        let object_key = object_key(db, key);
        let started = Instant::now();

        self.store
            .delete_object(&self.container, &object_key)
            .await
            .map_err(|e| {
                Redis3Error::from_storage("delete", e, |source| Redis3Error::BackendDeleteFailed {
                    object_key: object_key.clone(),
                    source,
                })
            })?;

        diag!(self.verbose, container = %self.container, object_key = %object_key, elapsed_ms = elapsed_ms(started), "delete");
        Ok(true)
    }

    /// Store each `values[i]` under `keys[i]`, reporting every position.
    ///
    /// Mismatched lengths fail before any backend call. Otherwise the outer
    /// result is `Ok` and each position carries its own outcome, in input
    /// order, once every write has settled.
    pub async fn mset_outcomes<K, V>(
        &self,
        keys: &[K],
        values: &[V],
    ) -> Redis3Result<Vec<Redis3Result<bool>>>
    where
        K: AsRef<str> + Sync,
        V: AsRef<str> + Sync,
    {
        if keys.len() != values.len() {
            return Err(ValidationError::LengthMismatch {
                keys: keys.len(),
                values: values.len(),
            }
            .into());
        }

        let db = self.db();
        let started = Instant::now();
        let outcomes = ordered_fan_out(keys.iter().zip(values), self.batch_concurrency, |(k, v)| {
            self.put_at(db, k.as_ref(), v.as_ref().as_bytes().to_vec())
        })
        .await;

        diag!(self.verbose, container = %self.container, db = %db, count = keys.len(), elapsed_ms = elapsed_ms(started), "mset");
        Ok(outcomes)
    }

    /// Read every key, reporting each position in input order.
    pub async fn mget_outcomes<K>(&self, keys: &[K]) -> Vec<Redis3Result<Option<String>>>
    where
        K: AsRef<str> + Sync,
    {
        let db = self.db();
        let started = Instant::now();
        let outcomes = ordered_fan_out(keys, self.batch_concurrency, |k| {
            self.get_string_at(db, k.as_ref())
        })
        .await;

        diag!(self.verbose, container = %self.container, db = %db, count = keys.len(), elapsed_ms = elapsed_ms(started), "mget");
        outcomes
    }

    /// Store `values[i]` under `keys[i]` for every `i`.
    ///
    /// Fails with [`Redis3Error::BatchFailed`] if any write failed; the other
    /// writes have still been applied.
    pub async fn mset<K, V>(&self, keys: &[K], values: &[V]) -> Redis3Result<Vec<bool>>
    where
        K: AsRef<str> + Sync,
        V: AsRef<str> + Sync,
    {
        let outcomes = self.mset_outcomes(keys, values).await?;
        settle("mset", outcomes)
    }

    /// Read every key; position `i` of the result answers `keys[i]`.
    pub async fn mget<K>(&self, keys: &[K]) -> Redis3Result<Vec<Option<String>>>
    where
        K: AsRef<str> + Sync,
    {
        let outcomes = self.mget_outcomes(keys).await;
        settle("mget", outcomes)
    }

    /// Lazily list the keys of the current database, optionally only those
    /// starting with `prefix_filter`.
    pub fn keys(&self, prefix_filter: Option<&str>) -> KeyScan<S> {
        let db = self.db();
        diag!(self.verbose, container = %self.container, db = %db, filter = ?prefix_filter, "keys");
        KeyScan::new(
            Arc::clone(&self.store),
            self.container.clone(),
            db,
            prefix_filter,
            self.list_page_size,
        )
    }

    async fn put_at(&self, db: DbNumber, key: &str, body: Vec<u8>) -> Redis3Result<bool> {
        let object_key = object_key(db, key);
        let started = Instant::now();

        self.store
            .put_object(&self.container, &object_key, body)
            .await
            .map_err(|e| write_failed(&object_key, e))?;

        diag!(self.verbose, container = %self.container, object_key = %object_key, elapsed_ms = elapsed_ms(started), "set");
        Ok(true)
    }

    async fn get_at(&self, db: DbNumber, key: &str) -> Redis3Result<Option<Vec<u8>>> {
        let object_key = object_key(db, key);
        let started = Instant::now();

        let body = self
            .store
            .get_object(&self.container, &object_key)
            .await
            .map_err(|e| {
                Redis3Error::from_storage("get", e, |source| Redis3Error::BackendReadFailed {
                    object_key: object_key.clone(),
                    source,
                })
            })?;

        diag!(
            self.verbose,
            container = %self.container,
            object_key = %object_key,
            found = body.is_some(),
            elapsed_ms = elapsed_ms(started),
            "get"
        );
        Ok(body)
    }

    async fn get_string_at(&self, db: DbNumber, key: &str) -> Redis3Result<Option<String>> {
        match self.get_at(db, key).await? {
            None => Ok(None),
            Some(body) => String::from_utf8(body).map(Some).map_err(|e| {
                ValidationError::InvalidValueType {
                    key: key.to_string(),
                    reason: format!("stored value is not UTF-8: {e}"),
                }
                .into()
            }),
        }
    }
}

fn write_failed(object_key: &str, error: StorageError) -> Redis3Error {
    Redis3Error::from_storage("set", error, |source| Redis3Error::BackendWriteFailed {
        object_key: object_key.to_string(),
        source,
    })
}

impl<S: ?Sized> std::fmt::Debug for Redis3Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redis3Client")
            .field("cache_name", &self.cache_name)
            .field("container", &self.container)
            .field("db", &self.db.load(Ordering::SeqCst))
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use redis3_core::ErrorKind;
    use redis3_storage::InMemoryObjectStore;

    async fn client() -> Redis3Client<InMemoryObjectStore> {
        Redis3Client::new(Arc::new(InMemoryObjectStore::new()), "unit")
            .await
            .expect("connect")
    }

    #[tokio::test]
    async fn test_connect_provisions_zonal_bucket() {
        let store = Arc::new(InMemoryObjectStore::new());
        let client = Redis3Client::new(store.clone(), "t1").await.expect("connect");

        assert_eq!(client.container_name(), "redis3-t1--use1-az5--x-s3");
        assert_eq!(client.cache_name(), "t1");
        assert_eq!(client.db(), DbNumber::new(0));
        assert_eq!(store.container_names(), vec!["redis3-t1--use1-az5--x-s3"]);
        assert_eq!(
            store.locality_hint("redis3-t1--use1-az5--x-s3").as_deref(),
            Some("use1-az5")
        );
    }

    #[tokio::test]
    async fn test_connect_without_hint_uses_plain_name() {
        let store = Arc::new(InMemoryObjectStore::new());
        let config = ClientConfig::new("t1").with_locality_hint(None::<String>);
        let client = Redis3Client::connect(store, &config).await.expect("connect");
        assert_eq!(client.container_name(), "redis3-t1");
    }

    #[tokio::test]
    async fn test_reconnect_to_owned_bucket_succeeds() {
        let store = Arc::new(InMemoryObjectStore::new());
        let first = Redis3Client::new(store.clone(), "t1").await.expect("connect");
        first.set("foo", "bar").await.expect("set");

        let second = Redis3Client::new(store, "t1").await.expect("reconnect");
        assert_eq!(second.get("foo").await.expect("get").as_deref(), Some("bar"));
    }

    #[tokio::test]
    async fn test_foreign_bucket_is_provisioning_failure() {
        let store =
            Arc::new(InMemoryObjectStore::new().with_foreign_container("redis3-taken--use1-az5--x-s3"));
        let err = Redis3Client::new(store, "taken").await.expect_err("foreign");
        assert_eq!(err.kind(), ErrorKind::ProvisioningFailed);
    }

    #[tokio::test]
    async fn test_set_get_overwrite_delete() {
        let client = client().await;

        assert!(client.set("foo", "bar").await.expect("set"));
        assert_eq!(client.get("foo").await.expect("get").as_deref(), Some("bar"));

        assert!(client.set("foo", "bar2").await.expect("set"));
        assert_eq!(client.get("foo").await.expect("get").as_deref(), Some("bar2"));

        assert!(client.delete("foo").await.expect("delete"));
        assert!(client.delete("foo").await.expect("delete missing"));
        assert_eq!(client.get("foo").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_empty_value_round_trips() {
        let client = client().await;
        client.set("empty", "").await.expect("set");
        assert_eq!(client.get("empty").await.expect("get").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_non_utf8_payload_is_invalid_value_type() {
        let client = client().await;
        client
            .set_bytes("raw", vec![0xff, 0xfe, 0x00])
            .await
            .expect("set_bytes");

        let err = client.get("raw").await.expect_err("not utf-8");
        assert_eq!(err.kind(), ErrorKind::InvalidValueType);
        assert_eq!(
            client.get_bytes("raw").await.expect("get_bytes"),
            Some(vec![0xff, 0xfe, 0x00])
        );
    }

    #[tokio::test]
    async fn test_select_db_validates_before_switching() {
        let client = client().await;
        client.select_db(7).expect("int db");
        assert_eq!(client.db(), DbNumber::new(7));

        let err = client.select_db("ciao").expect_err("not a number");
        assert_eq!(err.kind(), ErrorKind::InvalidDatabaseNumber);
        assert_eq!(client.db(), DbNumber::new(7));

        client.select_db("100").expect("numeric string");
        assert_eq!(client.db(), DbNumber::new(100));
    }

    #[tokio::test]
    async fn test_databases_are_isolated() {
        let client = client().await;
        client.set("k", "zero").await.expect("set");
        client.select_db(1).expect("select");
        assert_eq!(client.get("k").await.expect("get"), None);
        client.set("k", "one").await.expect("set");

        client.select_db(0).expect("select");
        assert_eq!(client.get("k").await.expect("get").as_deref(), Some("zero"));
    }

    #[tokio::test]
    async fn test_mset_length_mismatch_does_no_io() {
        let client = client().await;
        let err = client
            .mset(&["a", "b", "c"], &["1", "2"])
            .await
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::LengthMismatch);

        let stats = client.store().stats().await.expect("stats");
        assert_eq!(stats.puts, 0);
    }

    #[tokio::test]
    async fn test_mset_mget_preserve_order() {
        let client = client().await;
        let keys: Vec<String> = (0..10).map(|i| format!("k{i}")).collect();
        let values: Vec<String> = (0..10).map(|i| format!("v{i}")).collect();

        assert_eq!(
            client.mset(&keys, &values).await.expect("mset"),
            vec![true; 10]
        );

        let mut probe = keys.clone();
        probe.insert(3, "missing".to_string());
        let got = client.mget(&probe).await.expect("mget");
        assert_eq!(got.len(), 11);
        assert_eq!(got[3], None);
        assert_eq!(got[0].as_deref(), Some("v0"));
        assert_eq!(got[4].as_deref(), Some("v3"));
        assert_eq!(got[10].as_deref(), Some("v9"));
    }

    #[tokio::test]
    async fn test_empty_batches() {
        let client = client().await;
        let none: [&str; 0] = [];
        assert!(client.mset(&none, &none).await.expect("mset").is_empty());
        assert!(client.mget(&none).await.expect("mget").is_empty());
    }

    #[tokio::test]
    async fn test_keys_lists_current_db_with_filter() {
        let client = client().await;
        client
            .mset(&["user:1", "user:2", "order:1"], &["a", "b", "c"])
            .await
            .expect("mset");
        client.select_db(100).expect("select");
        client.set("user:9", "z").await.expect("set");
        client.select_db(0).expect("select");

        let mut all = client.keys(None).collect_all().await.expect("keys");
        all.sort();
        assert_eq!(all, vec!["order:1", "user:1", "user:2"]);

        let users = client.keys(Some("user:")).collect_all().await.expect("keys");
        assert_eq!(users, vec!["user:1", "user:2"]);
    }
}
