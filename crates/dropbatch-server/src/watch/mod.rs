//! Drop-directory watching and debounced run triggering
//!
//! # Architecture
//!
//! ```text
//! OS events -> DirectoryWatcher -> PendingFiles
//!                     |
//!                     v notify
//!              DebounceScheduler -> JobLauncher
//! ```
//!
//! `WatchService` wires the pieces together and `RunningWatch::stop` tears
//! them down.

pub mod debounce;
pub mod lifecycle;
pub mod pending;
pub mod watcher;

pub use debounce::{DebounceHandle, DebounceScheduler};
pub use lifecycle::{RunningWatch, WatchService};
pub use pending::PendingFiles;
pub use watcher::{DirectoryWatcher, WatchError};
