//! Chunked transactional import pipeline
//!
//! # Architecture
//!
//! - **types**: Run parameters, statistics, reports and errors
//! - **sink**: `ChunkSink` trait and the PostgreSQL implementation
//! - **listener**: Completion hooks called once per run
//! - **executor**: `ChunkedPipeline`, the read-transform-write loop
//! - **launcher**: `JobLauncher` boundary used by the debounce scheduler

pub mod executor;
pub mod launcher;
pub mod listener;
pub mod sink;
pub mod types;

pub use executor::ChunkedPipeline;
pub use launcher::{JobLauncher, LaunchError, PipelineLauncher};
pub use listener::{CompletionListener, DiscountAuditListener, LoggingListener};
pub use sink::{ChunkSink, PgDiscountSink};
pub use types::{PipelineError, RunParameters, RunReport, RunStats, RunStatus};
