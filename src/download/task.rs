//! Download tasks and their state machine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::record::Record;

/// Lifecycle of a [`DownloadTask`].
///
/// `Pending -> Downloading -> {Completed, Failed}`, plus the direct
/// `Pending -> Completed` edge when the output already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Whether a task came from the primary search or the single fallback round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    Primary,
    Fallback,
}

/// Illegal task transitions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot move task from {from} to {to}")]
    Invalid { from: TaskState, to: TaskState },

    /// Only failed tasks may be replaced.
    #[error("task in state {state} cannot be replaced")]
    NotFailed { state: TaskState },

    /// A fallback task is never replaced again.
    #[error("fallback task cannot be replaced")]
    FallbackExhausted,

    /// A replacement must target a different source.
    #[error("replacement must use a different source than '{source_name}'")]
    SameSource { source_name: String },
}

/// A unit of download work binding a record, a URL and an output path.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    record: Arc<Record>,
    download_url: String,
    output_path: PathBuf,
    source_name: String,
    attempt_count: u32,
    state: TaskState,
    origin: TaskOrigin,
}

impl DownloadTask {
    /// Creates a pending primary task.
    #[must_use]
    pub fn new(
        record: Arc<Record>,
        source_name: impl Into<String>,
        download_url: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            record,
            download_url: download_url.into(),
            output_path: output_path.into(),
            source_name: source_name.into(),
            attempt_count: 0,
            state: TaskState::Pending,
            origin: TaskOrigin::Primary,
        }
    }

    #[must_use]
    pub fn record(&self) -> &Arc<Record> {
        &self.record
    }

    #[must_use]
    pub fn download_url(&self) -> &str {
        &self.download_url
    }

    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Number of HTTP requests issued for this task (0, 1, or 2).
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    #[must_use]
    pub fn origin(&self) -> TaskOrigin {
        self.origin
    }

    /// `Pending -> Downloading`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Invalid`] from any other state.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Pending, TaskState::Downloading)
    }

    /// `Downloading -> Completed`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Invalid`] from any other state.
    pub fn complete(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Downloading, TaskState::Completed)
    }

    /// `Pending -> Completed` for an output that already exists on disk.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Invalid`] from any other state.
    pub fn complete_existing(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskState::Pending, TaskState::Completed)
    }

    /// Marks the task failed. Allowed from `Pending` (cancelled before start)
    /// and `Downloading`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Invalid`] for a task already finished.
    pub fn fail(&mut self) -> Result<(), TransitionError> {
        match self.state {
            TaskState::Pending | TaskState::Downloading => {
                self.state = TaskState::Failed;
                Ok(())
            }
            from => Err(TransitionError::Invalid {
                from,
                to: TaskState::Failed,
            }),
        }
    }

    pub(crate) fn set_attempt_count(&mut self, attempts: u32) {
        self.attempt_count = attempts;
    }

    /// Builds the single fallback task replacing this failed primary task.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless this task is a failed primary task
    /// and the replacement names a different source.
    pub fn replacement(
        &self,
        source_name: impl Into<String>,
        download_url: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Result<Self, TransitionError> {
        if self.state != TaskState::Failed {
            return Err(TransitionError::NotFailed { state: self.state });
        }
        if self.origin == TaskOrigin::Fallback {
            return Err(TransitionError::FallbackExhausted);
        }
        let source_name = source_name.into();
        if source_name == self.source_name {
            return Err(TransitionError::SameSource { source_name });
        }
        Ok(Self {
            record: Arc::clone(&self.record),
            download_url: download_url.into(),
            output_path: output_path.into(),
            source_name,
            attempt_count: 0,
            state: TaskState::Pending,
            origin: TaskOrigin::Fallback,
        })
    }

    fn transition(&mut self, from: TaskState, to: TaskState) -> Result<(), TransitionError> {
        if self.state != from {
            return Err(TransitionError::Invalid {
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn task() -> DownloadTask {
        let record = Arc::new(Record::new("Paper", vec!["Smith".to_string()]).unwrap());
        DownloadTask::new(record, "arxiv", "https://a/x.pdf", "/out/pdfs/x_arxiv.pdf")
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut task = task();
        assert_eq!(task.state(), TaskState::Pending);
        task.start().unwrap();
        task.complete().unwrap();
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn test_complete_requires_downloading() {
        let mut task = task();
        assert_eq!(
            task.complete(),
            Err(TransitionError::Invalid {
                from: TaskState::Pending,
                to: TaskState::Completed
            })
        );
    }

    #[test]
    fn test_failed_task_is_never_resumed() {
        let mut task = task();
        task.start().unwrap();
        task.fail().unwrap();
        assert!(task.start().is_err());
        assert!(task.complete().is_err());
        assert!(task.fail().is_err());
    }

    #[test]
    fn test_skip_existing_goes_straight_to_completed() {
        let mut task = task();
        task.complete_existing().unwrap();
        assert_eq!(task.state(), TaskState::Completed);
    }

    #[test]
    fn test_replacement_of_failed_primary() {
        let mut task = task();
        task.start().unwrap();
        task.set_attempt_count(2);
        task.fail().unwrap();

        let replacement = task
            .replacement("zenodo", "https://z/x.pdf", "/out/pdfs/x_zenodo.pdf")
            .unwrap();
        assert_eq!(replacement.state(), TaskState::Pending);
        assert_eq!(replacement.origin(), TaskOrigin::Fallback);
        assert_eq!(replacement.source_name(), "zenodo");
        assert_eq!(replacement.attempt_count(), 0);
        assert!(Arc::ptr_eq(replacement.record(), task.record()));
    }

    #[test]
    fn test_replacement_rejected_unless_failed() {
        let task = task();
        assert_eq!(
            task.replacement("zenodo", "u", "p").unwrap_err(),
            TransitionError::NotFailed {
                state: TaskState::Pending
            }
        );
    }

    #[test]
    fn test_replacement_rejected_for_same_source() {
        let mut task = task();
        task.fail().unwrap();
        assert!(matches!(
            task.replacement("arxiv", "u", "p"),
            Err(TransitionError::SameSource { .. })
        ));
    }

    #[test]
    fn test_fallback_task_cannot_be_replaced_again() {
        let mut primary = task();
        primary.fail().unwrap();
        let mut fallback = primary.replacement("zenodo", "u", "p").unwrap();
        fallback.start().unwrap();
        fallback.fail().unwrap();
        assert_eq!(
            fallback.replacement("core", "u2", "p2").unwrap_err(),
            TransitionError::FallbackExhausted
        );
    }
}
