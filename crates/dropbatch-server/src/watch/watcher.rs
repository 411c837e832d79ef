//! OS-level directory watcher feeding the pending set

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::debounce::DebounceHandle;
use super::pending::PendingFiles;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watch directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Watch path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to resolve watch directory {path}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register watch on {path}: {source}")]
    Init {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Watch event error: {0}")]
    Event(#[from] notify::Error),
}

/// What an event means for the pending set
#[derive(Debug, PartialEq, Eq)]
enum Arrival {
    /// A new file appeared in the directory
    New(PathBuf),
    /// An existing file changed; only relevant while it is still pending
    Touched(PathBuf),
}

/// Non-recursive watch on a single drop directory.
pub struct DirectoryWatcher {
    dir: PathBuf,
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
}

impl DirectoryWatcher {
    /// Register a watch on `dir`.
    ///
    /// Fails if the directory is missing or the OS refuses the watch.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, WatchError> {
        let requested = dir.as_ref();
        let dir = std::fs::canonicalize(requested).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                WatchError::MissingDirectory(requested.to_path_buf())
            } else {
                WatchError::Resolve {
                    path: requested.to_path_buf(),
                    source,
                }
            }
        })?;
        if !dir.is_dir() {
            return Err(WatchError::NotADirectory(dir));
        }

        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })
        .map_err(|source| WatchError::Init {
            path: dir.clone(),
            source,
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Init {
                path: dir.clone(),
                source,
            })?;

        info!(dir = %dir.display(), "Watching directory");

        Ok(Self {
            dir,
            watcher,
            events,
        })
    }

    /// Canonical path of the watched directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Receive events until `shutdown` fires, then release the OS watch.
    ///
    /// `debounce` is dropped on return, after the last `add`.
    pub async fn run(
        mut self,
        pending: Arc<PendingFiles>,
        debounce: DebounceHandle,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                event = self.events.recv() => match event {
                    Some(Ok(event)) => self.handle_event(event, &pending, &debounce),
                    Some(Err(e)) => warn!(error = %WatchError::from(e), "Dropping watch event"),
                    None => {
                        warn!(dir = %self.dir.display(), "Watch event channel closed");
                        break;
                    },
                },
            }
        }

        if let Err(e) = self.watcher.unwatch(&self.dir) {
            debug!(error = %e, "Unwatch failed");
        }
        info!(dir = %self.dir.display(), "Stopped watching directory");
    }

    fn handle_event(&self, event: Event, pending: &PendingFiles, debounce: &DebounceHandle) {
        let Some(arrival) = classify(&self.dir, &event) else {
            return;
        };

        match arrival {
            Arrival::New(path) => {
                if pending.add(path.clone()) {
                    debug!(path = %path.display(), "New file detected");
                }
                debounce.notify();
            },
            Arrival::Touched(path) => {
                if pending.contains(&path) {
                    debounce.notify();
                }
            },
        }
    }
}

fn classify(dir: &Path, event: &Event) -> Option<Arrival> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => None,
        EventKind::Create(_) => {
            let path = resolve(dir, event.paths.first()?);
            (!path.is_dir()).then_some(Arrival::New(path))
        },
        // Rename-into events carry the destination last
        EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both)) => {
            let path = resolve(dir, event.paths.last()?);
            (!path.is_dir()).then_some(Arrival::New(path))
        },
        EventKind::Modify(ModifyKind::Data(_) | ModifyKind::Any) => {
            Some(Arrival::Touched(resolve(dir, event.paths.first()?)))
        },
        _ => None,
    }
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}
