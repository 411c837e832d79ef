//! Run trigger boundary between the debounce scheduler and the pipeline

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

use super::executor::ChunkedPipeline;
use super::types::{RunParameters, RunReport};

/// Reasons a launcher refuses to start a run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LaunchError {
    #[error("Run parameters contain no files")]
    EmptyParameters,

    #[error("A run for [{file_paths}] at {timestamp} was already launched")]
    AlreadyLaunched { file_paths: String, timestamp: i64 },
}

/// Accepts run parameters and executes one run to completion.
///
/// A rejected launch never reaches the pipeline and produces no report.
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, params: RunParameters) -> Result<RunReport, LaunchError>;
}

/// In-process launcher that runs the pipeline on the caller's task.
///
/// Repeating the identity `(file_paths, timestamp)` of the previous launch is
/// rejected. Only that one identity is kept: runs are serialized and stamped
/// with the current time, so an older identity cannot come back.
pub struct PipelineLauncher {
    pipeline: ChunkedPipeline,
    last_launched: Mutex<Option<RunParameters>>,
}

impl PipelineLauncher {
    pub fn new(pipeline: ChunkedPipeline) -> Self {
        Self {
            pipeline,
            last_launched: Mutex::new(None),
        }
    }

    fn register(&self, params: &RunParameters) -> Result<(), LaunchError> {
        if params.is_empty() {
            return Err(LaunchError::EmptyParameters);
        }

        let mut last = self
            .last_launched
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if last.as_ref() == Some(params) {
            return Err(LaunchError::AlreadyLaunched {
                file_paths: params.joined_paths(),
                timestamp: params.timestamp(),
            });
        }

        *last = Some(params.clone());
        Ok(())
    }
}

#[async_trait]
impl JobLauncher for PipelineLauncher {
    async fn launch(&self, params: RunParameters) -> Result<RunReport, LaunchError> {
        if let Err(err) = self.register(&params) {
            warn!(error = %err, "Launch rejected");
            return Err(err);
        }

        Ok(self.pipeline.run(&params).await)
    }
}
