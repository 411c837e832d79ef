//! Core types for the chunked import pipeline

use chrono::{DateTime, Utc};
use dropbatch_common::DropbatchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::db::DbError;

/// Parameters of one pipeline run.
///
/// Created once per debounce flush and never mutated afterwards. The pair
/// `(file_paths, timestamp)` identifies the execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunParameters {
    file_paths: Vec<PathBuf>,
    /// Epoch milliseconds at which the run was requested
    timestamp: i64,
}

impl RunParameters {
    /// Parameters stamped with the current time
    pub fn new(file_paths: Vec<PathBuf>) -> Self {
        Self::with_timestamp(file_paths, Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(file_paths: Vec<PathBuf>, timestamp: i64) -> Self {
        Self {
            file_paths,
            timestamp,
        }
    }

    pub fn file_paths(&self) -> &[PathBuf] {
        &self.file_paths
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Comma-joined path list, the form job engines take as a single
    /// string parameter.
    pub fn joined_paths(&self) -> String {
        self.file_paths
            .iter()
            .map(|p| p.to_string_lossy())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_empty(&self) -> bool {
        self.file_paths.is_empty()
    }
}

/// Errors that stop a pipeline run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read record {record} of {path}: {source}")]
    Read {
        path: PathBuf,
        record: u64,
        #[source]
        source: csv_async::Error,
    },

    #[error("Failed to transform record: {0}")]
    Transform(#[from] DropbatchError),

    #[error("Failed to write chunk {chunk}: {source}")]
    Sink {
        chunk: u64,
        #[source]
        source: DbError,
    },

    #[error("Run cancelled after {chunks_committed} committed chunks")]
    Cancelled { chunks_committed: u64 },
}

/// Counters collected during one run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunStats {
    /// Records pulled from the source, including any in an uncommitted chunk
    pub records_read: u64,
    /// Records inside committed chunks
    pub records_written: u64,
    pub chunks_committed: u64,
    /// Chunks that were transformed or written but not committed
    pub chunks_failed: u64,
    pub duration_secs: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    /// Mark stats as completed
    pub fn complete(&mut self) {
        self.completed_at = Some(Utc::now());
        if let (Some(start), Some(end)) = (self.started_at, self.completed_at) {
            self.duration_secs = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    pub fn inc_read(&mut self) {
        self.records_read += 1;
    }

    pub fn record_commit(&mut self, records: u64) {
        self.chunks_committed += 1;
        self.records_written += records;
    }

    pub fn record_failed_chunk(&mut self) {
        self.chunks_failed += 1;
    }

    /// Written records per second
    pub fn records_per_second(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.records_written as f64 / self.duration_secs
        } else {
            0.0
        }
    }
}

/// Terminal status of a run
#[derive(Debug)]
pub enum RunStatus {
    Completed,
    Failed(PipelineError),
}

/// Outcome of one run, handed to the completion listener and returned to
/// the launcher.
#[derive(Debug)]
pub struct RunReport {
    pub params: RunParameters,
    pub status: RunStatus,
    pub stats: RunStats,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Completed)
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match &self.status {
            RunStatus::Completed => None,
            RunStatus::Failed(err) => Some(err),
        }
    }
}
