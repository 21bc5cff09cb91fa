//! redis3-playground: walk a cache through its command surface.
//!
//! Usage: `cargo run -p redis3-client --features playground -- [--config <path>] [cache-name]`
//!
//! Without a config file (neither `--config` nor `REDIS3_CONFIG`) an in-memory
//! cache named after the first positional argument is used.

use redis3_client::telemetry::{init_tracing, timed, TelemetryConfig, TelemetryError};
use redis3_client::Redis3Client;
use redis3_core::{ClientConfig, ConfigError, Redis3Error, StorageError};
use redis3_storage::{open_store, ObjectStore};
use serde_json::json;
use thiserror::Error;

const DEFAULT_CACHE_NAME: &str = "playground";

#[derive(Debug, Error)]
enum PlaygroundError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Client error: {0}")]
    Client(#[from] Redis3Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Check failed: {0}")]
    Check(String),
}

fn check(condition: bool, what: &str) -> Result<(), PlaygroundError> {
    if condition {
        Ok(())
    } else {
        Err(PlaygroundError::Check(what.to_string()))
    }
}

fn load_config() -> Result<ClientConfig, PlaygroundError> {
    match ClientConfig::load() {
        Ok(config) => Ok(config),
        Err(ConfigError::MissingConfigPath) => {
            let cache_name = std::env::args()
                .skip(1)
                .find(|arg| !arg.starts_with("--"))
                .unwrap_or_else(|| DEFAULT_CACHE_NAME.to_string());
            let config = ClientConfig::new(cache_name).with_verbose(true);
            config.validate()?;
            Ok(config)
        }
        Err(e) => Err(e.into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), PlaygroundError> {
    init_tracing(&TelemetryConfig::default())?;

    let config = load_config()?;
    let store = open_store(&config.backend)?;
    let client = timed("connect", Redis3Client::connect(store, &config)).await?;
    tracing::info!(bucket = client.container_name(), "Cache bucket");

    run(&client).await?;

    tracing::info!(cache = client.cache_name(), "Playground finished");
    Ok(())
}

async fn run(client: &Redis3Client<dyn ObjectStore>) -> Result<(), PlaygroundError> {
    // Single keys.
    check(timed("set", client.set("foo", "bar")).await?, "set foo")?;
    let value = timed("get", client.get("foo")).await?;
    check(value.as_deref() == Some("bar"), "foo == bar")?;

    client.set("foo", "bar2").await?;
    let value = client.get("foo").await?;
    check(value.as_deref() == Some("bar2"), "foo overwritten to bar2")?;

    // Structured values are serialized by the caller.
    let profile = json!({ "name": "ada", "langs": ["rust", "ml"], "score": 9.5 });
    client.set("profile", &serde_json::to_string(&profile)?).await?;
    let stored = client
        .get("profile")
        .await?
        .ok_or_else(|| PlaygroundError::Check("profile missing".to_string()))?;
    let decoded: serde_json::Value = serde_json::from_str(&stored)?;
    check(decoded == profile, "profile round-trips through JSON")?;

    let missing = uuid::Uuid::now_v7().to_string();
    check(client.get(&missing).await?.is_none(), "random key is absent")?;

    // Batches.
    let keys: Vec<String> = (0..5).map(|i| format!("playground_{i}")).collect();
    let values: Vec<String> = (0..5).map(|i| format!("value_{i}")).collect();
    let written = timed("mset", client.mset(&keys, &values)).await?;
    check(written.iter().all(|ok| *ok), "mset wrote every key")?;

    let read = timed("mget", client.mget(&keys)).await?;
    let expected: Vec<Option<String>> = values.iter().cloned().map(Some).collect();
    check(read == expected, "mget returns values in key order")?;

    // Listing.
    let listed = timed("keys", client.keys(None).collect_all()).await?;
    tracing::info!(count = listed.len(), "Keys in current database");
    check(
        keys.iter().all(|k| listed.contains(k)),
        "keys lists every playground key",
    )?;

    if let Some(first) = listed.first() {
        check(client.delete(first).await?, "delete listed key")?;
        check(client.get(first).await?.is_none(), "deleted key is gone")?;
    }
    check(
        timed("delete", client.delete(&uuid::Uuid::now_v7().to_string())).await?,
        "deleting a missing key succeeds",
    )?;

    // Databases.
    check(client.select_db("ciao").is_err(), "db 'ciao' is rejected")?;
    client.select_db("100")?;
    client.set("foo_100", "bar_100").await?;
    let listed = client.keys(None).collect_all().await?;
    check(listed == ["foo_100"], "db 100 holds only foo_100")?;

    check(client.delete("foo_100").await?, "delete foo_100")?;
    check(client.delete("foo_100").await?, "delete foo_100 again")?;
    check(client.get("foo_100").await?.is_none(), "foo_100 is gone")?;

    Ok(())
}
