//! Per-path write exclusivity.
//!
//! Two tasks can resolve to the same output path (duplicate records in one
//! input). Writers take the path's lock for the write-validate-rename window
//! so at most one of them touches the file at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lazily created mutex per output path. An entry lives only while some
/// task holds or waits for its lock.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

/// Exclusive ownership of one output path. Dropping it releases the lock.
#[derive(Debug)]
pub struct PathGuard<'a> {
    locks: &'a PathLocks,
    path: PathBuf,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive ownership of `path`.
    pub async fn lock(&self, path: &Path) -> PathGuard<'_> {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let mutex = self
            .locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        PathGuard {
            locks: self,
            path: path.to_path_buf(),
            guard: Some(mutex.lock_owned().await),
        }
    }

    /// Number of paths currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for PathGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // New lockers clone the Arc under the shard lock that `remove_if`
        // holds, so a count of 1 means only the map still refers to it.
        self.locks
            .locks
            .remove_if(&self.path, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
