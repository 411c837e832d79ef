//! Accumulator for paths observed since the last flush

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded set of pending file paths.
///
/// Paths keep their arrival order and are never duplicated. Every method
/// takes the same lock, so a snapshot sees exactly the adds that finished
/// before it and none that start after it.
#[derive(Debug, Default)]
pub struct PendingFiles {
    inner: Mutex<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    order: Vec<PathBuf>,
    seen: HashSet<PathBuf>,
}

impl PendingFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        // The guarded data is always left consistent, so a poisoned lock is
        // still usable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a path. Returns `false` if it was already pending.
    pub fn add(&self, path: PathBuf) -> bool {
        let mut pending = self.lock();
        if pending.seen.contains(&path) {
            return false;
        }
        pending.seen.insert(path.clone());
        pending.order.push(path);
        true
    }

    /// Take every pending path and leave the set empty.
    pub fn snapshot_and_clear(&self) -> Vec<PathBuf> {
        let mut pending = self.lock();
        pending.seen.clear();
        std::mem::take(&mut pending.order)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.lock().seen.contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().order.is_empty()
    }
}
