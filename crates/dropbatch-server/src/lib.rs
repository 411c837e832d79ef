//! Dropbatch Server Library
//!
//! Watches a drop directory for delimited discount files and loads them into
//! PostgreSQL in chunked transactions.
//!
//! # Overview
//!
//! - **Watching**: OS file events accumulate into a pending set
//! - **Debouncing**: a quiet interval coalesces bursts of arrivals into one run
//! - **Pipeline**: files are read as one source, transformed record by record
//!   and written in fixed-size chunks, one transaction per chunk
//! - **Configuration**: Environment-based configuration management
//!
//! # Example
//!
//! ```no_run
//! use dropbatch_server::{config::Config, db, pipeline, watch};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!
//!     let pipeline = pipeline::ChunkedPipeline::new(
//!         Arc::new(pipeline::PgDiscountSink::new(pool.clone(), "admin")),
//!         Arc::new(pipeline::LoggingListener),
//!         config.pipeline.chunk_size,
//!     );
//!     let launcher = Arc::new(pipeline::PipelineLauncher::new(pipeline));
//!
//!     let running = watch::WatchService::new(config.watch, launcher).start()?;
//!     tokio::signal::ctrl_c().await?;
//!     running.stop().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod db;
pub mod pipeline;
pub mod watch;
