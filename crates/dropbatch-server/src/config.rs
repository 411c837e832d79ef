//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Watch Configuration Constants
// ============================================================================

/// Default directory watched for dropped files.
pub const DEFAULT_WATCH_PATH: &str = "./resources";

/// Default quiet interval in milliseconds before a batch is launched.
pub const DEFAULT_QUIET_INTERVAL_MS: u64 = 2_000;

/// Default grace period in seconds for draining in-flight work on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Pipeline Configuration Constants
// ============================================================================

/// Default number of records committed per transaction.
pub const DEFAULT_CHUNK_SIZE: usize = 3;

/// Default attribution written to every inserted row.
pub const DEFAULT_CREATED_BY: &str = "admin";

// ============================================================================
// Database Configuration Constants
// ============================================================================

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/dropbatch";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 1;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub watch: WatchConfig,
    pub pipeline: PipelineConfig,
    pub database: DatabaseConfig,
}

/// Directory watcher and debounce configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub path: PathBuf,
    pub quiet_interval_ms: u64,
    pub shutdown_timeout_secs: u64,
}

/// Chunked pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub created_by: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl WatchConfig {
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_WATCH_PATH),
            quiet_interval_ms: DEFAULT_QUIET_INTERVAL_MS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            created_by: DEFAULT_CREATED_BY.to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from `.env`, the environment, and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            watch: WatchConfig {
                path: std::env::var("FILE_WATCH_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from(DEFAULT_WATCH_PATH)),
                quiet_interval_ms: env_or("FILE_WATCH_QUIET_MS", DEFAULT_QUIET_INTERVAL_MS),
                shutdown_timeout_secs: env_or(
                    "SHUTDOWN_TIMEOUT_SECS",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            pipeline: PipelineConfig {
                chunk_size: env_or("PIPELINE_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
                created_by: std::env::var("PIPELINE_CREATED_BY")
                    .unwrap_or_else(|_| DEFAULT_CREATED_BY.to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.watch.quiet_interval_ms == 0 {
            anyhow::bail!("Quiet interval must be greater than 0");
        }

        if self.pipeline.chunk_size == 0 {
            anyhow::bail!("Pipeline chunk_size must be greater than 0");
        }

        if self.pipeline.created_by.trim().is_empty() {
            anyhow::bail!("Pipeline created_by cannot be empty");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        // The directory itself is checked when the watcher registers it.
        if self.watch.path.as_os_str().is_empty() {
            anyhow::bail!("Watch path cannot be empty");
        }

        Ok(())
    }
}
