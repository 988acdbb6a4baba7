//! The single entry point: records in, documents and a report out.
//!
//! [`Pipeline::process_records`] runs three phases:
//! 1. concurrent record searches (bounded by `max_concurrent_searches`)
//! 2. one download batch for every record that found a candidate
//! 3. one fallback round for every failed primary download
//!
//! and folds everything into a [`Report`].

use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::download::{
    DownloadConfig, DownloadManager, DownloadResult, DownloadTask, EngineError, generate_filename,
};
use crate::fallback::{FallbackCoordinator, FallbackOutcome};
use crate::record::Record;
use crate::report::{RecordRun, Report, ReportAggregator, write_report};
use crate::search::{PacingDelay, SearchOrchestrator, SearchOutcome};
use crate::source::{PriorityError, SourceRegistry};

/// Default number of records searched at once.
pub const DEFAULT_SEARCH_CONCURRENCY: usize = 4;

/// Upper bound for `max_concurrent_searches`.
pub const MAX_SEARCH_CONCURRENCY: usize = 32;

/// Default number of results requested from each source.
pub const DEFAULT_LIMIT_PER_SOURCE: usize = 5;

/// Upper bound for `limit_per_source`.
pub const MAX_LIMIT_PER_SOURCE: usize = 100;

/// Configuration-contract violations. Only these abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid source priority: {0}")]
    Priority(#[from] PriorityError),

    #[error("invalid download configuration: {0}")]
    Engine(#[from] EngineError),

    #[error("invalid search settings: {message}")]
    InvalidSearchSettings { message: String },

    #[error("cannot prepare output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Search-phase settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    pub max_concurrent_searches: usize,
    pub limit_per_source: usize,
    pub pacing: PacingDelay,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_concurrent_searches: DEFAULT_SEARCH_CONCURRENCY,
            limit_per_source: DEFAULT_LIMIT_PER_SOURCE,
            pacing: PacingDelay::default(),
        }
    }
}

impl SearchSettings {
    /// Checks both bounds.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidSearchSettings`] for a zero or
    /// oversized value.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(1..=MAX_SEARCH_CONCURRENCY).contains(&self.max_concurrent_searches) {
            return Err(PipelineError::InvalidSearchSettings {
                message: format!(
                    "max concurrent searches must be between 1 and {MAX_SEARCH_CONCURRENCY}, got {}",
                    self.max_concurrent_searches
                ),
            });
        }
        if !(1..=MAX_LIMIT_PER_SOURCE).contains(&self.limit_per_source) {
            return Err(PipelineError::InvalidSearchSettings {
                message: format!(
                    "limit per source must be between 1 and {MAX_LIMIT_PER_SOURCE}, got {}",
                    self.limit_per_source
                ),
            });
        }
        Ok(())
    }
}

/// Wires sources, search, downloads, fallback and reporting together.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: SourceRegistry,
    settings: SearchSettings,
    fallback_enabled: bool,
}

impl Pipeline {
    #[must_use]
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry,
            settings: SearchSettings::default(),
            fallback_enabled: true,
        }
    }

    #[must_use]
    pub fn with_search_settings(mut self, settings: SearchSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback_enabled = enabled;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Probes every registered source.
    pub async fn check_sources(&self) -> Vec<(String, bool)> {
        self.registry.probe_all().await
    }

    /// Resolves and downloads every record, then writes the run report.
    ///
    /// Per-record failures end up in the report; they never fail the call.
    /// A report that cannot be written is logged and the [`Report`] is still
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] for an empty, unknown or duplicated priority
    /// list, out-of-range settings, or an output directory that cannot be
    /// created.
    #[instrument(skip_all, fields(records = records.len(), sources = ?priority))]
    pub async fn process_records(
        &self,
        records: Vec<Record>,
        priority: &[String],
        config: &DownloadConfig,
        cancel: &CancellationToken,
    ) -> Result<Report, PipelineError> {
        self.settings.validate()?;
        let sources = self.registry.resolve(priority)?;
        let manager = DownloadManager::new(config.clone())?;
        let layout = manager.layout().clone();
        layout
            .ensure()
            .await
            .map_err(|source| PipelineError::OutputDir {
                path: layout.root().to_path_buf(),
                source,
            })?;

        let records: Vec<Arc<Record>> = records.into_iter().map(Arc::new).collect();
        let orchestrator = SearchOrchestrator::new(self.settings.pacing);
        let limit = self.settings.limit_per_source;
        let width = self.settings.max_concurrent_searches;
        info!(records = records.len(), "searching sources");

        let mut searches: Vec<(usize, SearchOutcome)> = stream::iter(records.iter().enumerate())
            .map(|(index, record)| {
                let orchestrator = &orchestrator;
                let sources = &sources;
                let token = cancel.child_token();
                async move {
                    let outcome = orchestrator
                        .search_for_record(record, sources, limit, &token)
                        .await;
                    (index, outcome)
                }
            })
            .buffer_unordered(width)
            .collect()
            .await;
        searches.sort_by_key(|(index, _)| *index);
        let searches: Vec<SearchOutcome> = searches.into_iter().map(|(_, outcome)| outcome).collect();

        let mut task_owner = Vec::new();
        let mut tasks = Vec::new();
        for (index, outcome) in searches.iter().enumerate() {
            if let Some(selection) = outcome.selection() {
                let filename = generate_filename(&outcome.record, &selection.source_name);
                tasks.push(DownloadTask::new(
                    Arc::clone(&outcome.record),
                    selection.source_name.clone(),
                    selection.download_url(),
                    layout.pdf_path(&filename),
                ));
                task_owner.push(index);
            }
        }
        info!(
            found = tasks.len(),
            not_found = searches.len() - tasks.len(),
            "search phase complete"
        );

        let mut primaries: Vec<Option<DownloadResult>> = vec![None; searches.len()];
        for (index, result) in task_owner
            .into_iter()
            .zip(manager.download_batch(tasks, cancel).await)
        {
            primaries[index] = Some(result);
        }

        let coordinator = FallbackCoordinator::new(
            orchestrator.clone(),
            manager.clone(),
            limit,
            self.fallback_enabled,
        );
        let failed: Vec<(usize, &DownloadResult)> = primaries
            .iter()
            .enumerate()
            .filter_map(|(index, result)| result.as_ref().map(|r| (index, r)))
            .filter(|(_, result)| !result.success)
            .collect();
        debug!(failed = failed.len(), "starting fallback round");

        let recovered: Vec<(usize, FallbackOutcome)> = stream::iter(failed)
            .map(|(index, result)| {
                let coordinator = &coordinator;
                let sources = &sources;
                let token = cancel.child_token();
                async move { (index, coordinator.recover(result, sources, &token).await) }
            })
            .buffer_unordered(width)
            .collect()
            .await;
        let mut fallbacks: Vec<Option<FallbackOutcome>> = vec![None; searches.len()];
        for (index, outcome) in recovered {
            fallbacks[index] = Some(outcome);
        }

        let mut aggregator = ReportAggregator::new();
        for source in &sources {
            aggregator.register_source(source.name());
        }
        for ((search, primary), fallback) in searches.into_iter().zip(primaries).zip(fallbacks) {
            aggregator.record(&RecordRun {
                search,
                primary,
                fallback,
            });
        }
        if cancel.is_cancelled() {
            warn!("run cancelled, report is partial");
            aggregator.mark_cancelled();
        }
        let report = aggregator.finish();

        match write_report(&report, &layout) {
            Ok(path) => debug!(path = %path.display(), "report persisted"),
            Err(error) => warn!(error = %error, "failed to write run report"),
        }
        info!(
            total = report.summary.total_records,
            succeeded = report.summary.successful_downloads,
            failed_searches = report.summary.failed_searches,
            failed_downloads = report.summary.failed_downloads,
            fallback_successes = report.summary.fallback_successes,
            peak_downloads = manager.peak_concurrency(),
            "run complete"
        );
        Ok(report)
    }
}
