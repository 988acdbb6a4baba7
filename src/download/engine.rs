//! Bounded-concurrency download manager.
//!
//! This module provides the [`DownloadManager`] which executes a batch of
//! [`DownloadTask`]s under a semaphore bound, validates every payload, and
//! persists documents and their metadata sidecars.
//!
//! # Overview
//!
//! Per task:
//! 1. skip (as success) when the output exists and overwrite is off
//! 2. fetch with the single 403 retry (see [`HttpClient::fetch`])
//! 3. stream into `<name>.part`, validate, rename to the final name
//! 4. write the sidecar (best effort)
//!
//! There are no further retries; failed tasks are handed back to the caller
//! for the fallback round.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tokio::fs::File;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::{HttpClient, stream_to_file};
use super::config::{DownloadConfig, EngineError, OutputLayout, partial_path};
use super::error::{DownloadError, FailureKind};
use super::path_lock::PathLocks;
use super::task::DownloadTask;
use super::validate::validate_file;
use crate::sidecar::{SidecarMetadata, write_sidecar};

/// Outcome of one task.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// The task in its final state (`Completed` or `Failed`).
    pub task: DownloadTask,
    pub success: bool,
    /// Final document path, set on success.
    pub file_path: Option<PathBuf>,
    pub size_bytes: Option<u64>,
    pub elapsed_seconds: Option<f64>,
    /// Failure classification, set on failure.
    pub error: Option<FailureKind>,
    /// Human-readable failure reason, set on failure.
    pub reason: Option<String>,
    /// The document already existed and no request was made.
    pub skipped_existing: bool,
}

impl DownloadResult {
    fn succeeded(task: DownloadTask, size: u64, started: Instant, skipped_existing: bool) -> Self {
        let file_path = Some(task.output_path().to_path_buf());
        Self {
            task,
            success: true,
            file_path,
            size_bytes: Some(size),
            elapsed_seconds: Some(started.elapsed().as_secs_f64()),
            error: None,
            reason: None,
            skipped_existing,
        }
    }

    fn failed(task: DownloadTask, kind: FailureKind, reason: String, started: Instant) -> Self {
        Self {
            task,
            success: false,
            file_path: None,
            size_bytes: None,
            elapsed_seconds: Some(started.elapsed().as_secs_f64()),
            error: Some(kind),
            reason: Some(reason),
            skipped_existing: false,
        }
    }
}

/// Counters and gauges for a manager's lifetime.
///
/// Uses atomic counters for thread-safe updates from concurrent download
/// tasks.
#[derive(Debug, Default)]
pub struct DownloadStats {
    completed: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful downloads, including skipped existing files.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Tasks satisfied by an existing file.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at once.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn enter_flight(self: &Arc<Self>) -> FlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        FlightGuard(Arc::clone(self))
    }
}

/// Decrements the in-flight gauge when a transfer ends, however it ends.
struct FlightGuard(Arc<DownloadStats>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A `.part` file that is deleted on drop unless committed.
///
/// Covers every exit path: errors, validation failures, and the future being
/// dropped on cancellation.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn commit(mut self, final_path: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, final_path).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed && fs::remove_file(&self.path).is_ok() {
            debug!(path = %self.path.display(), "removed partial download");
        }
    }
}

struct Stored {
    size: u64,
    already_present: bool,
}

/// Executes download batches under a fixed concurrency bound.
///
/// Cheap to clone; clones share the semaphore, client pool, path locks and
/// stats.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: HttpClient,
    config: Arc<DownloadConfig>,
    layout: OutputLayout,
    semaphore: Arc<Semaphore>,
    path_locks: Arc<PathLocks>,
    stats: Arc<DownloadStats>,
}

impl DownloadManager {
    /// Creates a manager for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the configuration is out of range or the
    /// HTTP client cannot be built.
    pub fn new(config: DownloadConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let client = HttpClient::new(&config)?;
        debug!(
            concurrency = config.max_concurrent_downloads,
            output_dir = %config.output_dir.display(),
            "creating download manager"
        );
        Ok(Self {
            client,
            layout: config.layout(),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_downloads)),
            config: Arc::new(config),
            path_locks: Arc::new(PathLocks::new()),
            stats: Arc::new(DownloadStats::new()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Highest number of transfers that held a permit at the same time.
    #[must_use]
    pub fn peak_concurrency(&self) -> usize {
        self.stats.peak_in_flight()
    }

    /// Runs every task and returns one result per task, in task order.
    ///
    /// Individual failures never fail the batch. Cancelling `cancel` stops
    /// tasks that have not started and aborts in-flight transfers; their
    /// results carry [`FailureKind::Cancelled`].
    #[instrument(skip(self, tasks, cancel), fields(task_count = tasks.len()))]
    pub async fn download_batch(
        &self,
        tasks: Vec<DownloadTask>,
        cancel: &CancellationToken,
    ) -> Vec<DownloadResult> {
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            let manager = self.clone();
            let token = cancel.child_token();
            let snapshot = task.clone();
            handles.push((snapshot, tokio::spawn(manager.run_task(task, token))));
        }

        debug!(task_count = handles.len(), "waiting for downloads to complete");

        let mut results = Vec::with_capacity(handles.len());
        for (snapshot, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(url = snapshot.download_url(), error = %e, "download task panicked");
                    results.push(self.finish_aborted(snapshot, e.to_string()));
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        info!(
            succeeded,
            failed = results.len() - succeeded,
            peak_in_flight = self.stats.peak_in_flight(),
            "download batch complete"
        );
        results
    }

    async fn run_task(self, mut task: DownloadTask, cancel: CancellationToken) -> DownloadResult {
        let started = Instant::now();
        let url = task.download_url().to_string();

        if cancel.is_cancelled() {
            return self.finish_failed(task, &DownloadError::cancelled(&url), started);
        }

        if !self.config.overwrite_existing
            && let Some(size) = existing_size(task.output_path()).await
        {
            if let Err(error) = task.complete_existing() {
                warn!(url = %url, error = %error, "task was not pending");
            }
            self.stats.completed.fetch_add(1, Ordering::SeqCst);
            self.stats.skipped.fetch_add(1, Ordering::SeqCst);
            info!(path = %task.output_path().display(), "output exists, skipping download");
            return DownloadResult::succeeded(task, size, started, true);
        }

        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return self.finish_failed(task, &DownloadError::cancelled(&url), started);
        };
        let _flight = self.stats.enter_flight();

        if let Err(error) = task.start() {
            warn!(url = %url, error = %error, "task was not pending");
            return self.finish_failed(task, &DownloadError::cancelled(&url), started);
        }
        debug!(url = %url, source = task.source_name(), "download started");

        let mut attempts = 0;
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DownloadError::cancelled(&url)),
            stored = self.fetch_and_store(&task, &mut attempts) => stored,
        };
        task.set_attempt_count(attempts);

        match outcome {
            Ok(stored) => {
                if let Err(error) = task.complete() {
                    warn!(url = %url, error = %error, "unexpected task state on completion");
                }
                if self.config.save_metadata && !stored.already_present {
                    self.write_metadata(&task, stored.size);
                }
                self.stats.completed.fetch_add(1, Ordering::SeqCst);
                info!(
                    path = %task.output_path().display(),
                    bytes = stored.size,
                    attempts,
                    "download complete"
                );
                DownloadResult::succeeded(task, stored.size, started, stored.already_present)
            }
            Err(error) => self.finish_failed(task, &error, started),
        }
    }

    async fn fetch_and_store(
        &self,
        task: &DownloadTask,
        attempts: &mut u32,
    ) -> Result<Stored, DownloadError> {
        let url = task.download_url();
        let final_path = task.output_path();
        let response = self.client.fetch(url, attempts).await?;

        let _path_guard = self.path_locks.lock(final_path).await;
        if !self.config.overwrite_existing
            && let Some(size) = existing_size(final_path).await
        {
            debug!(path = %final_path.display(), "output written by another task meanwhile");
            return Ok(Stored {
                size,
                already_present: true,
            });
        }

        if let Some(parent) = final_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        let partial = PartialFile::new(partial_path(final_path));
        let file = File::create(partial.path())
            .await
            .map_err(|e| DownloadError::io(partial.path(), e))?;
        let written = stream_to_file(file, response, url, partial.path()).await?;
        let size = validate_file(partial.path(), url).await?;
        debug!(written, size, "payload validated");

        partial
            .commit(final_path)
            .await
            .map_err(|e| DownloadError::io(final_path, e))?;
        Ok(Stored {
            size,
            already_present: false,
        })
    }

    fn write_metadata(&self, task: &DownloadTask, size: u64) {
        let sidecar_path = self.layout.metadata_path_for(task.output_path());
        let metadata = SidecarMetadata::from_task(task, size);
        if let Err(error) = write_sidecar(&sidecar_path, &metadata) {
            warn!(path = %sidecar_path.display(), error = %error, "failed to write metadata sidecar");
        }
    }

    /// Result for a task whose worker never reported back.
    fn finish_aborted(&self, mut snapshot: DownloadTask, reason: String) -> DownloadResult {
        if let Err(transition) = snapshot.fail() {
            warn!(error = %transition, "unexpected task state on abort");
        }
        self.stats.failed.fetch_add(1, Ordering::SeqCst);
        DownloadResult::failed(snapshot, FailureKind::Aborted, reason, Instant::now())
    }

    fn finish_failed(
        &self,
        mut task: DownloadTask,
        error: &DownloadError,
        started: Instant,
    ) -> DownloadResult {
        if let Err(transition) = task.fail() {
            warn!(error = %transition, "unexpected task state on failure");
        }
        self.stats.failed.fetch_add(1, Ordering::SeqCst);
        warn!(
            url = task.download_url(),
            source = task.source_name(),
            attempts = task.attempt_count(),
            error = %error,
            "download failed"
        );
        DownloadResult::failed(task, error.kind(), error.to_string(), started)
    }
}

async fn existing_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path)
        .await
        .ok()
        .filter(std::fs::Metadata::is_file)
        .map(|meta| meta.len())
}
