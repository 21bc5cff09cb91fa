//! Client configuration.
//!
//! Only `cache_name` is required. Everything else has a default matching the
//! behavior of a freshly constructed client.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::DbNumber;
use crate::naming::{container_name, DEFAULT_BUCKET_PREFIX, DEFAULT_LOCALITY_HINT};

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "REDIS3_CONFIG";

/// Default bound on concurrent backend calls within one mset/mget.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 32;

/// Default number of keys requested per listing page.
pub const DEFAULT_LIST_PAGE_SIZE: usize = 1000;

/// Default LMDB map size in megabytes.
pub const DEFAULT_MAP_SIZE_MB: usize = 256;

/// Which object store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Lmdb,
}

/// Passthrough configuration for the backend capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Directory of the LMDB environment. Required for `lmdb`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,
    /// Free-form backend options (credentials, endpoints, ...).
    ///
    /// The memory and LMDB backends take none; opening either with a
    /// non-empty map fails.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            path: None,
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            options: BTreeMap::new(),
        }
    }
}

/// Configuration accepted by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub cache_name: String,
    #[serde(default)]
    pub db: DbNumber,
    #[serde(default = "default_locality_hint")]
    pub locality_hint: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or REDIS3_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    /// Create a config for `cache_name` with every other field defaulted.
    pub fn new(cache_name: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            db: DbNumber::default(),
            locality_hint: default_locality_hint(),
            verbose: false,
            bucket_prefix: default_bucket_prefix(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            backend: BackendConfig::default(),
        }
    }

    /// Set the initial database number.
    pub fn with_db(mut self, db: DbNumber) -> Self {
        self.db = db;
        self
    }

    /// Set or clear the locality hint.
    pub fn with_locality_hint(mut self, hint: Option<impl Into<String>>) -> Self {
        self.locality_hint = hint.map(Into::into);
        self
    }

    /// Enable or disable verbose diagnostics.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Override the bucket prefix.
    pub fn with_bucket_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.bucket_prefix = prefix.into();
        self
    }

    /// Set the bound on concurrent calls per batch.
    pub fn with_batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency;
        self
    }

    /// Set the listing page size.
    pub fn with_list_page_size(mut self, page_size: usize) -> Self {
        self.list_page_size = page_size;
        self
    }

    /// Set the backend configuration.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    /// Bucket name this configuration resolves to.
    pub fn container_name(&self) -> String {
        container_name(
            &self.bucket_prefix,
            &self.cache_name,
            self.locality_hint.as_deref(),
        )
    }

    /// Load from the path given by `--config` or `REDIS3_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cache_name",
                reason: "must not be empty".to_string(),
            });
        }
        if self.bucket_prefix.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bucket_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(hint) = &self.locality_hint {
            if hint.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "locality_hint",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_concurrency",
                reason: "must be > 0".to_string(),
            });
        }
        if self.list_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "list_page_size",
                reason: "must be > 0".to_string(),
            });
        }
        if self.backend.kind == BackendKind::Lmdb {
            match &self.backend.path {
                Some(path) if !path.as_os_str().is_empty() => {}
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "backend.path",
                        reason: "required for the lmdb backend".to_string(),
                    });
                }
            }
            if self.backend.map_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "backend.map_size_mb",
                    reason: "must be > 0".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_locality_hint() -> Option<String> {
    Some(DEFAULT_LOCALITY_HINT.to_string())
}

fn default_bucket_prefix() -> String {
    DEFAULT_BUCKET_PREFIX.to_string()
}

fn default_batch_concurrency() -> usize {
    DEFAULT_BATCH_CONCURRENCY
}

fn default_list_page_size() -> usize {
    DEFAULT_LIST_PAGE_SIZE
}

fn default_map_size_mb() -> usize {
    DEFAULT_MAP_SIZE_MB
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new("t1");
        assert_eq!(config.db, DbNumber::new(0));
        assert_eq!(config.locality_hint.as_deref(), Some(DEFAULT_LOCALITY_HINT));
        assert!(!config.verbose);
        assert_eq!(config.bucket_prefix, "redis3");
        assert_eq!(config.batch_concurrency, DEFAULT_BATCH_CONCURRENCY);
        assert_eq!(config.backend.kind, BackendKind::Memory);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_container_name_follows_config() {
        let config = ClientConfig::new("t1");
        assert_eq!(config.container_name(), "redis3-t1--use1-az5--x-s3");

        let config = ClientConfig::new("t1")
            .with_bucket_prefix("bench")
            .with_locality_hint(None::<String>);
        assert_eq!(config.container_name(), "bench-t1");
    }

    #[test]
    fn test_minimal_toml_parses_with_defaults() {
        let config: ClientConfig = toml::from_str("cache_name = \"mycache\"").expect("parse");
        assert_eq!(config, ClientConfig::new("mycache"));
    }

    #[test]
    fn test_full_toml_parses() {
        let raw = r#"
            cache_name = "bench"
            db = 3
            locality_hint = "usw2-az1"
            verbose = true
            bucket_prefix = "kv"
            batch_concurrency = 8
            list_page_size = 50

            [backend]
            kind = "lmdb"
            path = "/tmp/redis3"
            map_size_mb = 64

            [backend.options]
            region = "us-west-2"
        "#;
        let config: ClientConfig = toml::from_str(raw).expect("parse");
        assert_eq!(config.db, DbNumber::new(3));
        assert_eq!(config.backend.kind, BackendKind::Lmdb);
        assert_eq!(config.backend.options.get("region").map(String::as_str), Some("us-west-2"));
        assert_eq!(config.container_name(), "kv-bench--usw2-az1--x-s3");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ClientConfig, _> = toml::from_str("cache_name = \"a\"\nttl = 5");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = ClientConfig::new("  ").validate().expect_err("empty name");
        assert!(matches!(err, ConfigError::InvalidValue { field: "cache_name", .. }));

        let err = ClientConfig::new("a")
            .with_batch_concurrency(0)
            .validate()
            .expect_err("zero concurrency");
        assert!(matches!(err, ConfigError::InvalidValue { field: "batch_concurrency", .. }));

        let err = ClientConfig::new("a")
            .with_list_page_size(0)
            .validate()
            .expect_err("zero page size");
        assert!(matches!(err, ConfigError::InvalidValue { field: "list_page_size", .. }));

        let lmdb_without_path = BackendConfig {
            kind: BackendKind::Lmdb,
            ..BackendConfig::default()
        };
        let err = ClientConfig::new("a")
            .with_backend(lmdb_without_path)
            .validate()
            .expect_err("lmdb needs a path");
        assert!(matches!(err, ConfigError::InvalidValue { field: "backend.path", .. }));
    }

    #[test]
    fn test_from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "cache_name = \"from-file\"\nverbose = true").expect("write");
        let config = ClientConfig::from_path(file.path()).expect("load");
        assert_eq!(config.cache_name, "from-file");
        assert!(config.verbose);
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let err = ClientConfig::from_path(Path::new("/nonexistent/redis3.toml"))
            .expect_err("missing file");
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
