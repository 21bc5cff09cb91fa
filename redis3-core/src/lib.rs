//! redis3 Core - Naming, Database Numbers, Errors, Configuration
//!
//! Pure building blocks shared by the storage backends and the client.
//! Nothing in this crate performs I/O except loading a config file.

pub mod config;
pub mod db;
pub mod error;
pub mod naming;

pub use config::{BackendConfig, BackendKind, ClientConfig, ConfigError};
pub use db::{DbNumber, IntoDbNumber};
pub use error::{ErrorKind, Redis3Error, Redis3Result, StorageError, ValidationError};
pub use naming::{
    container_name, db_prefix, object_key, strip_db_prefix, DEFAULT_BUCKET_PREFIX,
    DEFAULT_LOCALITY_HINT,
};
