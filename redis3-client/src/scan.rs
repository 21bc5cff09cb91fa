//! Lazy, restartable key listing.
//!
//! A [`KeyScan`] holds one page of listing results and the continuation
//! cursor, fetching the next page only when the buffered one is drained. Each
//! call to `Redis3Client::keys` starts a fresh scan from the first page.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use redis3_core::{db_prefix, strip_db_prefix, DbNumber, Redis3Error, Redis3Result};
use redis3_storage::ObjectStore;

/// Pull-based iterator over the user keys of one database.
pub struct KeyScan<S: ?Sized> {
    store: Arc<S>,
    container: String,
    db: DbNumber,
    filter: String,
    list_prefix: String,
    page_size: usize,
    buffer: VecDeque<String>,
    cursor: Option<String>,
    exhausted: bool,
}

impl<S: ObjectStore + ?Sized> KeyScan<S> {
    pub(crate) fn new(
        store: Arc<S>,
        container: String,
        db: DbNumber,
        prefix_filter: Option<&str>,
        page_size: usize,
    ) -> Self {
        let filter = prefix_filter.unwrap_or_default().to_string();
        let list_prefix = format!("{}{}", db_prefix(db), filter);
        Self {
            store,
            container,
            db,
            filter,
            list_prefix,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Database this scan lists.
    pub fn db(&self) -> DbNumber {
        self.db
    }

    /// Next user key, or `None` once the listing is exhausted.
    ///
    /// An error ends the scan.
    pub async fn next_key(&mut self) -> Option<Redis3Result<String>> {
        loop {
            if let Some(object_key) = self.buffer.pop_front() {
                match strip_db_prefix(self.db, &object_key) {
                    Some(user_key) if user_key.starts_with(&self.filter) => {
                        return Some(Ok(user_key.to_string()));
                    }
                    Some(_) => continue,
                    None => {
                        self.stop();
                        return Some(Err(Redis3Error::CorruptObjectKey {
                            expected_prefix: db_prefix(self.db),
                            object_key,
                        }));
                    }
                }
            }

            if self.exhausted {
                return None;
            }

            if let Err(e) = self.fetch_page().await {
                self.stop();
                return Some(Err(e));
            }
        }
    }

    /// Drain the scan into a vector, failing on the first error.
    pub async fn collect_all(mut self) -> Redis3Result<Vec<String>> {
        let mut keys = Vec::new();
        while let Some(key) = self.next_key().await {
            keys.push(key?);
        }
        Ok(keys)
    }

    /// Adapt the scan into a [`Stream`] of keys.
    pub fn into_stream(self) -> impl Stream<Item = Redis3Result<String>> {
        stream::unfold(self, |mut scan| async move {
            scan.next_key().await.map(|item| (item, scan))
        })
    }

    async fn fetch_page(&mut self) -> Redis3Result<()> {
        let page = self
            .store
            .list_objects(
                &self.container,
                &self.list_prefix,
                self.cursor.as_deref(),
                self.page_size,
            )
            .await
            .map_err(|e| {
                Redis3Error::from_storage("keys", e, |source| Redis3Error::BackendReadFailed {
                    object_key: self.list_prefix.clone(),
                    source,
                })
            })?;

        tracing::trace!(
            container = %self.container,
            prefix = %self.list_prefix,
            count = page.keys.len(),
            more = page.next_cursor.is_some(),
            "Fetched listing page"
        );

        self.buffer.extend(page.keys);
        self.cursor = page.next_cursor;
        if self.cursor.is_none() {
            self.exhausted = true;
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.exhausted = true;
        self.buffer.clear();
        self.cursor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use redis3_storage::InMemoryObjectStore;

    const BUCKET: &str = "redis3-scan";

    async fn store_with(keys: &[&str], max_page_size: usize) -> Arc<InMemoryObjectStore> {
        let store = Arc::new(InMemoryObjectStore::with_max_page_size(max_page_size));
        store.create_container(BUCKET, None).await.expect("create");
        for key in keys {
            store
                .put_object(BUCKET, key, Vec::new())
                .await
                .expect("put should succeed");
        }
        store
    }

    #[tokio::test]
    async fn test_scan_follows_pagination() {
        let keys: Vec<String> = (0..7).map(|i| format!("0/k{i}")).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = store_with(&refs, 2).await;

        let scan = KeyScan::new(store.clone(), BUCKET.to_string(), DbNumber::new(0), None, 2);
        let found = scan.collect_all().await.expect("scan");
        assert_eq!(found, (0..7).map(|i| format!("k{i}")).collect::<Vec<_>>());

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.list_pages, 4);
    }

    #[tokio::test]
    async fn test_scan_applies_filter_after_prefix() {
        let store = store_with(&["0/user:1", "0/user:2", "0/order:1", "5/user:9"], 10).await;
        let scan = KeyScan::new(store, BUCKET.to_string(), DbNumber::new(0), Some("user:"), 10);
        assert_eq!(
            scan.collect_all().await.expect("scan"),
            vec!["user:1", "user:2"]
        );
    }

    #[tokio::test]
    async fn test_scan_only_sees_its_database() {
        let store = store_with(&["1/a", "10/b", "100/c"], 10).await;
        let scan = KeyScan::new(store, BUCKET.to_string(), DbNumber::new(10), None, 10);
        assert_eq!(scan.collect_all().await.expect("scan"), vec!["b"]);
    }

    #[tokio::test]
    async fn test_scan_as_stream() {
        let store = store_with(&["0/a", "0/b", "0/c"], 1).await;
        let scan = KeyScan::new(store, BUCKET.to_string(), DbNumber::new(0), None, 1);
        let keys: Vec<String> = scan
            .into_stream()
            .map(|item| item.expect("key"))
            .collect()
            .await;
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_scan_missing_bucket_is_read_failure() {
        let store = Arc::new(InMemoryObjectStore::new());
        let mut scan = KeyScan::new(store, "nope".to_string(), DbNumber::new(0), None, 10);
        match scan.next_key().await {
            Some(Err(Redis3Error::BackendReadFailed { .. })) => {}
            other => panic!("expected BackendReadFailed, got {other:?}"),
        }
        assert!(scan.next_key().await.is_none(), "scan ends after an error");
    }
}
