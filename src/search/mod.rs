//! Search orchestration: resolve one record to one downloadable candidate.
//!
//! Sources are tried strictly in priority order and the first candidate with
//! a usable download URL wins. A random pacing delay separates consecutive
//! sources for the same record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::record::Record;
use crate::source::{CandidateDocument, SourceAdapter};

/// Lower bound of the default pause between two sources.
pub const DEFAULT_PACING_MIN: Duration = Duration::from_millis(500);

/// Upper bound of the default pause between two sources.
pub const DEFAULT_PACING_MAX: Duration = Duration::from_secs(2);

/// Uniform random wait inserted before every source after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingDelay {
    min: Duration,
    max: Duration,
}

impl PacingDelay {
    /// Creates a delay range; reversed bounds are swapped.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    /// No pause at all.
    #[must_use]
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Draws one delay from the range.
    #[must_use]
    pub fn sample(&self) -> Duration {
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }
}

impl Default for PacingDelay {
    fn default() -> Self {
        Self::new(DEFAULT_PACING_MIN, DEFAULT_PACING_MAX)
    }
}

/// What one source said about one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Found,
    NotFound,
    /// The source failed; treated like `NotFound` for selection.
    Error(String),
}

/// One source queried for one record.
#[derive(Debug, Clone)]
pub struct SearchAttempt {
    pub record: Arc<Record>,
    pub source_name: String,
    pub outcome: AttemptOutcome,
    /// The selected candidate, present only for `Found`.
    pub candidate: Option<CandidateDocument>,
    pub timestamp: DateTime<Utc>,
}

/// The winning source and candidate for a record.
#[derive(Debug, Clone)]
pub struct Selection {
    pub source_name: String,
    pub candidate: CandidateDocument,
}

impl Selection {
    #[must_use]
    pub fn download_url(&self) -> &str {
        self.candidate.download_url.trim()
    }
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Found(Selection),
    NotFound,
}

/// Result of resolving one record.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub record: Arc<Record>,
    pub resolution: Resolution,
    /// Every source actually queried, in order.
    pub attempts: Vec<SearchAttempt>,
    /// The search stopped early because the run was cancelled.
    pub cancelled: bool,
}

impl SearchOutcome {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self.resolution, Resolution::Found(_))
    }

    #[must_use]
    pub fn selection(&self) -> Option<&Selection> {
        match &self.resolution {
            Resolution::Found(selection) => Some(selection),
            Resolution::NotFound => None,
        }
    }

    fn not_found(record: Arc<Record>, attempts: Vec<SearchAttempt>, cancelled: bool) -> Self {
        Self {
            record,
            resolution: Resolution::NotFound,
            attempts,
            cancelled,
        }
    }
}

/// Tries sources in priority order for one record at a time.
///
/// Holds no per-record state, so one orchestrator serves any number of
/// concurrent record searches.
#[derive(Debug, Clone, Default)]
pub struct SearchOrchestrator {
    pacing: PacingDelay,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(pacing: PacingDelay) -> Self {
        Self { pacing }
    }

    #[must_use]
    pub fn pacing(&self) -> PacingDelay {
        self.pacing
    }

    /// Resolves `record` against `sources`, stopping at the first candidate
    /// with a non-empty download URL.
    ///
    /// Source failures are recorded as [`AttemptOutcome::Error`] and never
    /// stop the iteration. Cancellation stops it and yields `NotFound` with
    /// the attempts made so far.
    pub async fn search_for_record(
        &self,
        record: &Arc<Record>,
        sources: &[Arc<dyn SourceAdapter>],
        limit_per_source: usize,
        cancel: &CancellationToken,
    ) -> SearchOutcome {
        self.search_excluding(record, sources, None, limit_per_source, cancel)
            .await
    }

    /// Like [`Self::search_for_record`] but skips the source named `excluded`.
    #[instrument(skip_all, fields(title = record.title(), excluded = excluded.unwrap_or("")))]
    pub async fn search_excluding(
        &self,
        record: &Arc<Record>,
        sources: &[Arc<dyn SourceAdapter>],
        excluded: Option<&str>,
        limit_per_source: usize,
        cancel: &CancellationToken,
    ) -> SearchOutcome {
        let query = record.search_query();
        let mut attempts = Vec::new();
        let candidates_in_order = sources
            .iter()
            .filter(|source| excluded != Some(source.name()));

        for (position, source) in candidates_in_order.enumerate() {
            if cancel.is_cancelled() {
                return SearchOutcome::not_found(Arc::clone(record), attempts, true);
            }

            if position > 0 {
                let delay = self.pacing.sample();
                if !delay.is_zero() {
                    debug!(delay_ms = delay.as_millis(), "pacing before next source");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return SearchOutcome::not_found(Arc::clone(record), attempts, true);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }

            let source_name = source.name().to_string();
            let searched = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                result = source.try_search(&query, limit_per_source) => Some(result),
            };
            let Some(result) = searched else {
                return SearchOutcome::not_found(Arc::clone(record), attempts, true);
            };

            let mut attempt = SearchAttempt {
                record: Arc::clone(record),
                source_name: source_name.clone(),
                outcome: AttemptOutcome::NotFound,
                candidate: None,
                timestamp: Utc::now(),
            };
            match result {
                Ok(candidates) => {
                    let total = candidates.len();
                    if let Some(candidate) = candidates
                        .into_iter()
                        .find(CandidateDocument::has_download_url)
                    {
                        info!(source = %source_name, url = candidate.download_url.trim(), "candidate selected");
                        attempt.outcome = AttemptOutcome::Found;
                        attempt.candidate = Some(candidate.clone());
                        attempts.push(attempt);
                        return SearchOutcome {
                            record: Arc::clone(record),
                            resolution: Resolution::Found(Selection {
                                source_name,
                                candidate,
                            }),
                            attempts,
                            cancelled: false,
                        };
                    }
                    debug!(source = %source_name, total, "no candidate with a download URL");
                }
                Err(error) => {
                    warn!(source = %source_name, error = %error, "source search failed");
                    attempt.outcome = AttemptOutcome::Error(error.to_string());
                }
            }
            attempts.push(attempt);
        }

        info!(tried = attempts.len(), "no source yielded a download URL");
        SearchOutcome::not_found(Arc::clone(record), attempts, false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::sources::ScriptedSource;

    fn record() -> Arc<Record> {
        Arc::new(Record::new("Deep Residual Learning", vec!["He, Kaiming".to_string()]).unwrap())
    }

    fn orchestrator() -> SearchOrchestrator {
        SearchOrchestrator::new(PacingDelay::none())
    }

    #[test]
    fn test_pacing_delay_swaps_reversed_bounds() {
        let delay = PacingDelay::new(Duration::from_secs(2), Duration::from_millis(500));
        assert_eq!(delay.min(), Duration::from_millis(500));
        assert_eq!(delay.max(), Duration::from_secs(2));
    }

    #[test]
    fn test_pacing_delay_sample_stays_in_range() {
        let delay = PacingDelay::default();
        for _ in 0..100 {
            let sampled = delay.sample();
            assert!(sampled >= DEFAULT_PACING_MIN && sampled <= DEFAULT_PACING_MAX);
        }
        assert_eq!(PacingDelay::none().sample(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_first_usable_candidate_wins_and_stops_iteration() {
        let first = ScriptedSource::with_url("arxiv", "https://arxiv.org/pdf/1512.03385");
        let second = ScriptedSource::with_url("zenodo", "https://zenodo.org/x.pdf");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![first.clone(), second.clone()];

        let outcome = orchestrator()
            .search_for_record(&record(), &sources, 5, &CancellationToken::new())
            .await;

        let selection = outcome.selection().unwrap();
        assert_eq!(selection.source_name, "arxiv");
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 0);
    }

    #[tokio::test]
    async fn test_candidates_without_url_are_skipped() {
        let no_url = ScriptedSource::with_candidates(
            "arxiv",
            vec![CandidateDocument::new("arxiv", "Landing only").with_document_url("https://a/abs")],
        );
        let with_url = ScriptedSource::with_url("zenodo", "https://zenodo.org/x.pdf");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![no_url, with_url];

        let outcome = orchestrator()
            .search_for_record(&record(), &sources, 5, &CancellationToken::new())
            .await;

        assert_eq!(outcome.selection().unwrap().source_name, "zenodo");
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::NotFound);
        assert_eq!(outcome.attempts[1].outcome, AttemptOutcome::Found);
    }

    #[tokio::test]
    async fn test_source_errors_are_recorded_and_iteration_continues() {
        let broken = ScriptedSource::failing("arxiv", "bad feed");
        let empty = ScriptedSource::empty("zenodo");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![broken, empty];

        let outcome = orchestrator()
            .search_for_record(&record(), &sources, 5, &CancellationToken::new())
            .await;

        assert!(!outcome.is_found());
        assert!(!outcome.cancelled);
        assert_eq!(outcome.attempts.len(), 2);
        assert!(matches!(outcome.attempts[0].outcome, AttemptOutcome::Error(ref r) if r.contains("bad feed")));
        assert_eq!(outcome.attempts[1].outcome, AttemptOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_search_excluding_skips_named_source() {
        let arxiv = ScriptedSource::with_url("arxiv", "https://arxiv.org/pdf/1");
        let zenodo = ScriptedSource::with_url("zenodo", "https://zenodo.org/x.pdf");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![arxiv.clone(), zenodo];

        let outcome = orchestrator()
            .search_excluding(&record(), &sources, Some("arxiv"), 5, &CancellationToken::new())
            .await;

        assert_eq!(outcome.selection().unwrap().source_name, "zenodo");
        assert_eq!(arxiv.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_search_queries_nothing() {
        let arxiv = ScriptedSource::with_url("arxiv", "https://arxiv.org/pdf/1");
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![arxiv.clone()];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator()
            .search_for_record(&record(), &sources, 5, &cancel)
            .await;

        assert!(outcome.cancelled);
        assert!(!outcome.is_found());
        assert_eq!(arxiv.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_applies_only_between_sources() {
        let pacing = PacingDelay::new(Duration::from_secs(1), Duration::from_secs(1));
        let sources: Vec<Arc<dyn SourceAdapter>> = vec![
            ScriptedSource::empty("a"),
            ScriptedSource::empty("b"),
            ScriptedSource::empty("c"),
        ];

        let started = tokio::time::Instant::now();
        let outcome = SearchOrchestrator::new(pacing)
            .search_for_record(&record(), &sources, 5, &CancellationToken::new())
            .await;

        assert_eq!(outcome.attempts.len(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }
}
