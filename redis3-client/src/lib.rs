//! redis3 Client - Redis-Style Commands over Object Storage
//!
//! A cache is one bucket; each key is one object named `{db}/{key}`. The
//! client exposes `set`/`get`/`delete`, order-preserving `mset`/`mget` with
//! bounded concurrency, and a lazy paginated `keys` scan.
//!
//! ```no_run
//! use std::sync::Arc;
//! use redis3_client::Redis3Client;
//! use redis3_storage::InMemoryObjectStore;
//!
//! # async fn demo() -> redis3_core::Redis3Result<()> {
//! let client = Redis3Client::new(Arc::new(InMemoryObjectStore::new()), "my-cache").await?;
//! client.set("foo", "bar").await?;
//! assert_eq!(client.get("foo").await?.as_deref(), Some("bar"));
//! # Ok(())
//! # }
//! ```

mod batch;
pub mod blocking;
pub mod client;
pub mod scan;
pub mod telemetry;

pub use blocking::{BlockingClient, BlockingKeys};
pub use client::Redis3Client;
pub use scan::KeyScan;

pub use redis3_core::{
    ClientConfig, DbNumber, ErrorKind, IntoDbNumber, Redis3Error, Redis3Result, ValidationError,
};
