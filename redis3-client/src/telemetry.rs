//! Tracing Initialization and Timing
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! plain or a JSON fmt layer, and provides [`timed`] for logging how long a
//! future took.

use std::future::Future;
use std::time::Instant;

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable selecting the log format (`json` or `plain`).
pub const LOG_FORMAT_ENV_VAR: &str = "REDIS3_LOG_FORMAT";

/// Filter applied when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "redis3_client=info,redis3_storage=info,warn";

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Plain
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Filter directives; `RUST_LOG` wins when set.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: std::env::var(EnvFilter::DEFAULT_ENV)
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
            format: std::env::var(LOG_FORMAT_ENV_VAR)
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to init subscriber: {0}")]
    Init(String),
}

/// Install the global tracing subscriber.
///
/// Call once at startup; a second call fails with [`TelemetryError::Init`].
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_new(&config.filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: config.filter.clone(),
            reason: e.to_string(),
        })?;

    let json = config.format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(filter = %config.filter, format = ?config.format, "Tracing initialized");
    Ok(())
}

/// Await `fut` and log how long it took under `label`.
pub async fn timed<F: Future>(label: &str, fut: F) -> F::Output {
    let started = Instant::now();
    let output = fut.await;
    let elapsed = started.elapsed();
    tracing::info!(
        step = label,
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "Step finished"
    );
    output
}
