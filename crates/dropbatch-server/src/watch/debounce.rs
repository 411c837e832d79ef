//! Quiet-interval debounce between file arrivals and pipeline runs
//!
//! Each notification (re)arms a single deadline `quiet_interval` in the
//! future. When the deadline passes without a further notification the
//! pending set is snapshotted and handed to the launcher as one run. Runs
//! execute on the scheduler task, so at most one is in flight at a time;
//! notifications received meanwhile arm the next flush.
//!
//! The scheduler stops once every [`DebounceHandle`] is dropped. Paths still
//! pending at that point are flushed immediately, so whoever holds the last
//! handle can stop adding paths before the final snapshot is taken.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use super::pending::PendingFiles;
use crate::pipeline::{JobLauncher, RunParameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceState {
    Idle,
    Armed { deadline: Instant },
}

/// Handle used by the watcher to report an arrival.
///
/// The scheduler keeps running while any clone is alive.
#[derive(Debug, Clone)]
pub struct DebounceHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl DebounceHandle {
    /// (Re)arm the flush deadline.
    pub fn notify(&self) {
        let _ = self.tx.send(());
    }
}

pub struct DebounceScheduler {
    pending: Arc<PendingFiles>,
    launcher: Arc<dyn JobLauncher>,
    quiet_interval: Duration,
}

impl DebounceScheduler {
    pub fn new(
        pending: Arc<PendingFiles>,
        launcher: Arc<dyn JobLauncher>,
        quiet_interval: Duration,
    ) -> Self {
        Self {
            pending,
            launcher,
            quiet_interval,
        }
    }

    /// Start the scheduler task.
    pub fn spawn(self) -> (DebounceHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (DebounceHandle { tx }, task)
    }

    async fn run(self, mut rx: mpsc::UnboundedReceiver<()>) {
        let mut state = DebounceState::Idle;

        loop {
            state = match state {
                DebounceState::Idle => match rx.recv().await {
                    Some(()) => self.arm(),
                    None => break,
                },
                DebounceState::Armed { deadline } => tokio::select! {
                    biased;
                    msg = rx.recv() => match msg {
                        Some(()) => self.arm(),
                        None => break,
                    },
                    _ = sleep_until(deadline) => {
                        self.flush().await;
                        DebounceState::Idle
                    },
                },
            };
        }

        // Every handle is gone; paths added since the last flush still get
        // their run.
        self.flush().await;
        debug!("Debounce scheduler stopped");
    }

    fn arm(&self) -> DebounceState {
        DebounceState::Armed {
            deadline: Instant::now() + self.quiet_interval,
        }
    }

    async fn flush(&self) {
        let paths = self.pending.snapshot_and_clear();
        if paths.is_empty() {
            return;
        }

        let params = RunParameters::new(paths);
        info!(
            files = params.file_paths().len(),
            file_paths = %params.joined_paths(),
            "Launching run"
        );

        if let Err(e) = self.launcher.launch(params.clone()).await {
            // Paths are not requeued; re-dropping the files starts a new run.
            error!(
                error = %e,
                file_paths = %params.joined_paths(),
                "Run was not launched"
            );
        }
    }
}
