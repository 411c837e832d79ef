//! Start/stop wiring for the watcher and debounce scheduler

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::debounce::DebounceScheduler;
use super::pending::PendingFiles;
use super::watcher::{DirectoryWatcher, WatchError};
use crate::config::WatchConfig;
use crate::pipeline::JobLauncher;

/// Owns the watch configuration and the launcher runs are handed to.
pub struct WatchService {
    config: WatchConfig,
    launcher: Arc<dyn JobLauncher>,
    run_cancel: CancellationToken,
}

impl WatchService {
    pub fn new(config: WatchConfig, launcher: Arc<dyn JobLauncher>) -> Self {
        Self {
            config,
            launcher,
            run_cancel: CancellationToken::new(),
        }
    }

    /// Token fired when the shutdown grace period runs out.
    ///
    /// Pass it (or a child) to `ChunkedPipeline::with_cancellation` so an
    /// in-flight run stops at its next chunk boundary instead of being aborted.
    pub fn with_run_cancellation(mut self, run_cancel: CancellationToken) -> Self {
        self.run_cancel = run_cancel;
        self
    }

    /// Register the directory watch and spawn the watcher and scheduler tasks.
    ///
    /// Returns once both tasks are running. A missing directory or a refused
    /// OS watch is returned as an error and nothing is spawned.
    pub fn start(self) -> Result<RunningWatch, WatchError> {
        let watcher = DirectoryWatcher::new(&self.config.path)?;
        let dir = watcher.dir().to_path_buf();

        let pending = Arc::new(PendingFiles::new());
        let watcher_shutdown = CancellationToken::new();

        let scheduler =
            DebounceScheduler::new(pending.clone(), self.launcher, self.config.quiet_interval());
        let (debounce, scheduler_task) = scheduler.spawn();

        // The watcher holds the only debounce handle, so the scheduler drains
        // only after the watcher's last add.
        let watcher_task =
            tokio::spawn(watcher.run(pending.clone(), debounce, watcher_shutdown.clone()));

        info!(
            dir = %dir.display(),
            quiet_interval_ms = self.config.quiet_interval_ms,
            "File watcher started"
        );

        Ok(RunningWatch {
            pending,
            watcher_shutdown,
            run_cancel: self.run_cancel,
            watcher_task,
            scheduler_task,
            shutdown_timeout: self.config.shutdown_timeout(),
        })
    }
}

/// Handle to a started watch service.
pub struct RunningWatch {
    pending: Arc<PendingFiles>,
    watcher_shutdown: CancellationToken,
    run_cancel: CancellationToken,
    watcher_task: JoinHandle<()>,
    scheduler_task: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl RunningWatch {
    /// Paths seen since the last flush
    pub fn pending(&self) -> &PendingFiles {
        &self.pending
    }

    /// Stop watching and drain the scheduler.
    ///
    /// The watcher stops and releases its OS handle first. The scheduler then
    /// flushes whatever is pending and gets `shutdown_timeout` to finish. If
    /// the run is still going after that, the run cancellation token fires and
    /// the run gets one more `shutdown_timeout` to reach a chunk boundary and
    /// report. Only then is the scheduler task aborted.
    pub async fn stop(self) {
        info!("Stopping file watcher");
        self.watcher_shutdown.cancel();

        if let Err(e) = self.watcher_task.await {
            warn!(error = %e, "Watcher task ended abnormally");
        }

        let mut scheduler_task = self.scheduler_task;
        if drain(&mut scheduler_task, self.shutdown_timeout).await {
            info!("File watcher stopped");
            return;
        }

        warn!(
            timeout_secs = self.shutdown_timeout.as_secs(),
            "Run still in progress after grace period, cancelling at next chunk boundary"
        );
        self.run_cancel.cancel();

        if drain(&mut scheduler_task, self.shutdown_timeout).await {
            info!("File watcher stopped");
            return;
        }

        warn!("Scheduler did not stop after cancellation, aborting");
        scheduler_task.abort();
        let _ = scheduler_task.await;
    }
}

/// Wait up to `timeout` for `task`. Returns `false` if it is still running.
async fn drain(task: &mut JoinHandle<()>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(error = %e, "Scheduler task ended abnormally");
            true
        },
        Err(_) => false,
    }
}
