//! One-round recovery for failed primary downloads.
//!
//! A failed primary task triggers a new search that excludes the source that
//! just failed. A usable candidate becomes one replacement task, written to a
//! path keyed by the new source. Fallback tasks are never replaced again.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::{
    DownloadManager, DownloadResult, FailureKind, TaskOrigin, TaskState, generate_filename,
};
use crate::search::{SearchOrchestrator, SearchOutcome};
use crate::source::SourceAdapter;

/// Why a failed result was not given a fallback round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    /// The result did not fail.
    NotFailed,
    /// The failed task was itself a fallback.
    AlreadyFallback,
    /// The failure was a cancellation, or the run is cancelled.
    Cancelled,
}

/// What a fallback round did.
#[derive(Debug, Clone)]
pub enum FallbackOutcome {
    Skipped(SkipReason),
    /// The search ran; `result` is present only when a replacement was
    /// downloaded.
    Attempted {
        search: SearchOutcome,
        result: Option<DownloadResult>,
    },
}

impl FallbackOutcome {
    /// The replacement download succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Attempted { result: Some(result), .. } if result.success)
    }
}

/// Re-searches and re-downloads once per failed primary task.
#[derive(Debug, Clone)]
pub struct FallbackCoordinator {
    orchestrator: SearchOrchestrator,
    manager: DownloadManager,
    limit_per_source: usize,
    enabled: bool,
}

impl FallbackCoordinator {
    #[must_use]
    pub fn new(
        orchestrator: SearchOrchestrator,
        manager: DownloadManager,
        limit_per_source: usize,
        enabled: bool,
    ) -> Self {
        Self {
            orchestrator,
            manager,
            limit_per_source,
            enabled,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Runs the single fallback round for `failed`, if it qualifies.
    #[instrument(skip_all, fields(title = failed.task.record().title(), source = failed.task.source_name()))]
    pub async fn recover(
        &self,
        failed: &DownloadResult,
        sources: &[Arc<dyn SourceAdapter>],
        cancel: &CancellationToken,
    ) -> FallbackOutcome {
        if let Some(reason) = self.skip_reason(failed, cancel) {
            debug!(?reason, "fallback skipped");
            return FallbackOutcome::Skipped(reason);
        }

        let task = &failed.task;
        let search = self
            .orchestrator
            .search_excluding(
                task.record(),
                sources,
                Some(task.source_name()),
                self.limit_per_source,
                cancel,
            )
            .await;

        let Some(selection) = search.selection() else {
            info!("no alternative source found");
            return FallbackOutcome::Attempted {
                search,
                result: None,
            };
        };

        let filename = generate_filename(task.record(), &selection.source_name);
        let output_path = self.manager.layout().pdf_path(&filename);
        let replacement = match task.replacement(
            selection.source_name.clone(),
            selection.download_url(),
            output_path,
        ) {
            Ok(replacement) => replacement,
            Err(error) => {
                warn!(error = %error, "cannot build replacement task");
                return FallbackOutcome::Attempted {
                    search,
                    result: None,
                };
            }
        };

        info!(
            new_source = replacement.source_name(),
            url = replacement.download_url(),
            "submitting fallback download"
        );
        let result = self
            .manager
            .download_batch(vec![replacement], cancel)
            .await
            .into_iter()
            .next();

        FallbackOutcome::Attempted { search, result }
    }

    fn skip_reason(&self, failed: &DownloadResult, cancel: &CancellationToken) -> Option<SkipReason> {
        if !self.enabled {
            return Some(SkipReason::Disabled);
        }
        if failed.success || failed.task.state() != TaskState::Failed {
            return Some(SkipReason::NotFailed);
        }
        if failed.task.origin() == TaskOrigin::Fallback {
            return Some(SkipReason::AlreadyFallback);
        }
        if cancel.is_cancelled() || failed.error == Some(FailureKind::Cancelled) {
            return Some(SkipReason::Cancelled);
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::download::{DownloadConfig, DownloadTask};
    use crate::record::Record;
    use crate::search::PacingDelay;
    use crate::test_support::sources::ScriptedSource;
    use tempfile::TempDir;

    fn coordinator(dir: &Path, enabled: bool) -> FallbackCoordinator {
        let manager = DownloadManager::new(DownloadConfig::new(dir)).unwrap();
        FallbackCoordinator::new(SearchOrchestrator::new(PacingDelay::none()), manager, 5, enabled)
    }

    async fn failed_primary(coordinator: &FallbackCoordinator) -> DownloadResult {
        let record = Arc::new(Record::new("Neural Fields", vec!["Mildenhall".to_string()]).unwrap());
        let task = DownloadTask::new(
            record,
            "arxiv",
            "not a url",
            coordinator.manager.layout().pdf_path("neural_arxiv.pdf"),
        );
        coordinator
            .manager
            .download_batch(vec![task], &CancellationToken::new())
            .await
            .remove(0)
    }

    #[tokio::test]
    async fn test_disabled_coordinator_skips() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), false);
        let failed = failed_primary(&coordinator).await;
        let outcome = coordinator.recover(&failed, &[], &CancellationToken::new()).await;
        assert!(matches!(outcome, FallbackOutcome::Skipped(SkipReason::Disabled)));
    }

    #[tokio::test]
    async fn test_cancelled_run_skips() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), true);
        let failed = failed_primary(&coordinator).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = coordinator.recover(&failed, &[], &cancel).await;
        assert!(matches!(outcome, FallbackOutcome::Skipped(SkipReason::Cancelled)));
    }

    #[tokio::test]
    async fn test_failed_source_is_excluded_from_fallback_search() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), true);
        let failed = failed_primary(&coordinator).await;
        let arxiv = ScriptedSource::with_url("arxiv", "https://arxiv.org/pdf/1");
        let zenodo = ScriptedSource::empty("zenodo");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![arxiv.clone(), zenodo.clone()];

        let outcome = coordinator
            .recover(&failed, &sources, &CancellationToken::new())
            .await;

        assert_eq!(arxiv.calls(), 0);
        assert_eq!(zenodo.calls(), 1);
        assert!(matches!(outcome, FallbackOutcome::Attempted { result: None, .. }));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_fallback_task_is_not_recovered_again() {
        let dir = TempDir::new().unwrap();
        let coordinator = coordinator(dir.path(), true);
        let failed = failed_primary(&coordinator).await;
        let zenodo = ScriptedSource::with_url("zenodo", "also not a url");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![zenodo.clone()];

        let first = coordinator
            .recover(&failed, &sources, &CancellationToken::new())
            .await;
        let FallbackOutcome::Attempted {
            result: Some(second_failure),
            ..
        } = first
        else {
            panic!("expected an attempted fallback download");
        };
        assert!(!second_failure.success);
        assert_eq!(second_failure.task.origin(), TaskOrigin::Fallback);
        assert_eq!(second_failure.task.source_name(), "zenodo");

        let again = coordinator
            .recover(&second_failure, &sources, &CancellationToken::new())
            .await;
        assert!(matches!(again, FallbackOutcome::Skipped(SkipReason::AlreadyFallback)));
        assert_eq!(zenodo.calls(), 1);
    }
}
