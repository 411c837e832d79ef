//! Shared helpers for dropbatch-server integration tests
//!
//! `TestPostgres` starts a disposable PostgreSQL container with migrations
//! applied. Tests using it need Docker and are marked `#[ignore]`.

#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use dropbatch_common::types::Discount;
use dropbatch_server::db::DbResult;
use dropbatch_server::pipeline::{ChunkSink, CompletionListener, RunReport};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// Install a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dropbatch_server=debug,dropbatch_common=debug")
        .with_test_writer()
        .try_init();
}

/// Write `content` to `dir/name` and return the full path.
pub fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Poll `check` every 50ms until it holds or `timeout` elapses.
pub async fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    check()
}

// ============================================================================
// In-memory pipeline boundaries
// ============================================================================

/// Sink that keeps every committed chunk in memory
#[derive(Default)]
pub struct RecordingSink {
    pub commits: Mutex<Vec<Vec<Discount>>>,
}

impl RecordingSink {
    /// Every committed record, in commit order
    pub fn discounts(&self) -> Vec<Discount> {
        self.commits.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.commits
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|d| d.name.clone())
            .collect()
    }
}

#[async_trait]
impl ChunkSink for RecordingSink {
    async fn write_chunk(&self, chunk: &[Discount]) -> DbResult<u64> {
        self.commits.lock().unwrap().push(chunk.to_vec());
        Ok(chunk.len() as u64)
    }
}

/// Listener that records the file list and outcome of every run
#[derive(Default)]
pub struct RecordingListener {
    pub runs: Mutex<Vec<(Vec<PathBuf>, bool)>>,
}

impl RecordingListener {
    pub fn run_count(&self) -> usize {
        self.runs.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionListener for RecordingListener {
    async fn after_run(&self, report: &RunReport) {
        self.runs
            .lock()
            .unwrap()
            .push((report.params.file_paths().to_vec(), report.is_success()));
    }
}

// ============================================================================
// PostgreSQL Test Container
// ============================================================================

/// PostgreSQL test container with migrations pre-applied
pub struct TestPostgres {
    container: ContainerAsync<Postgres>,
    pool: PgPool,
    connection_string: String,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .with_tag("16-alpine")
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        Ok(Self {
            container,
            pool,
            connection_string,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }
}
