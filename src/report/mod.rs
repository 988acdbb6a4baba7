//! Run statistics and the persisted JSON report.
//!
//! The [`ReportAggregator`] is fed one [`RecordRun`] per record by the
//! pipeline, which owns it exclusively. [`ReportAggregator::finish`] freezes
//! the counters into an immutable [`Report`].

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::download::{DownloadResult, OutputLayout};
use crate::fallback::FallbackOutcome;
use crate::search::{AttemptOutcome, SearchAttempt, SearchOutcome};

/// Errors writing the report file.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("I/O error writing report {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything that happened to one record.
#[derive(Debug, Clone)]
pub struct RecordRun {
    pub search: SearchOutcome,
    /// Present when the search found a candidate and a download ran.
    pub primary: Option<DownloadResult>,
    /// Present when the primary download failed.
    pub fallback: Option<FallbackOutcome>,
}

impl RecordRun {
    /// The record ended with a stored document, from either round.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.final_success().is_some()
    }

    fn final_success(&self) -> Option<&DownloadResult> {
        if let Some(primary) = self.primary.as_ref().filter(|r| r.success) {
            return Some(primary);
        }
        match &self.fallback {
            Some(FallbackOutcome::Attempted {
                result: Some(result),
                ..
            }) if result.success => Some(result),
            _ => None,
        }
    }
}

/// Per-source counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    pub searches: usize,
    pub successes: usize,
    pub downloads: usize,
    pub download_successes: usize,
    pub bytes: u64,
}

/// Stage at which a record (or one of its rounds) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Search,
    Download,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessEntry {
    pub title: String,
    pub authors: String,
    pub year: Option<i32>,
    pub source: String,
    pub url: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub via_fallback: bool,
    pub skipped_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub title: String,
    pub stage: FailureStage,
    pub source: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_records: usize,
    pub successful_searches: usize,
    pub failed_searches: usize,
    /// Records that ended with a stored document.
    pub successful_downloads: usize,
    /// Records whose download (and fallback, if any) failed.
    pub failed_downloads: usize,
    pub primary_download_failures: usize,
    pub fallback_attempts: usize,
    pub fallback_successes: usize,
    pub skipped_existing: usize,
    /// Bytes written during this run; skipped files are not counted.
    pub total_bytes: u64,
    pub total_size: String,
    pub search_success_rate: f64,
    pub download_success_rate: f64,
    pub cancelled: bool,
}

/// Immutable snapshot of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub sources: BTreeMap<String, SourceStats>,
    pub successes: Vec<SuccessEntry>,
    pub failures: Vec<FailureEntry>,
}

impl Report {
    /// Every record succeeded and the run was not cancelled.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        !self.summary.cancelled && self.summary.successful_downloads == self.summary.total_records
    }
}

/// Accumulates statistics across records.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    summary: ReportSummary,
    sources: BTreeMap<String, SourceStats>,
    successes: Vec<SuccessEntry>,
    failures: Vec<FailureEntry>,
}

impl ReportAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source so it appears in the table even if never queried.
    pub fn register_source(&mut self, name: &str) {
        self.sources.entry(name.to_string()).or_default();
    }

    /// Folds one record's searches and downloads into the totals.
    pub fn record(&mut self, run: &RecordRun) {
        let title = run.search.record.title().to_string();
        self.summary.total_records += 1;
        self.count_attempts(&run.search.attempts);

        if run.search.is_found() {
            self.summary.successful_searches += 1;
        } else {
            self.summary.failed_searches += 1;
            let reason = if run.search.cancelled {
                "cancelled"
            } else {
                "no source yielded a download URL"
            };
            self.failures.push(FailureEntry {
                title,
                stage: FailureStage::Search,
                source: None,
                reason: reason.to_string(),
            });
            return;
        }

        let Some(primary) = &run.primary else {
            return;
        };
        self.count_download(primary);
        if !primary.success {
            self.summary.primary_download_failures += 1;
            self.push_download_failure(&title, FailureStage::Download, primary);
        }

        if let Some(FallbackOutcome::Attempted { search, result }) = &run.fallback {
            self.summary.fallback_attempts += 1;
            self.count_attempts(&search.attempts);
            match result {
                Some(result) => {
                    self.count_download(result);
                    if result.success {
                        self.summary.fallback_successes += 1;
                    } else {
                        self.push_download_failure(&title, FailureStage::Fallback, result);
                    }
                }
                None => self.failures.push(FailureEntry {
                    title: title.clone(),
                    stage: FailureStage::Fallback,
                    source: None,
                    reason: if search.cancelled {
                        "cancelled".to_string()
                    } else {
                        "no alternative source yielded a download URL".to_string()
                    },
                }),
            }
        }

        match run.final_success() {
            Some(result) => {
                self.summary.successful_downloads += 1;
                self.successes.push(success_entry(result));
            }
            None => self.summary.failed_downloads += 1,
        }
    }

    pub fn mark_cancelled(&mut self) {
        self.summary.cancelled = true;
    }

    /// Freezes the counters into a [`Report`].
    #[must_use]
    pub fn finish(mut self) -> Report {
        let summary = &mut self.summary;
        summary.total_size = format_bytes(summary.total_bytes);
        summary.search_success_rate =
            ratio(summary.successful_searches, summary.total_records);
        summary.download_success_rate =
            ratio(summary.successful_downloads, summary.successful_searches);
        Report {
            generated_at: Utc::now(),
            summary: self.summary,
            sources: self.sources,
            successes: self.successes,
            failures: self.failures,
        }
    }

    fn count_attempts(&mut self, attempts: &[SearchAttempt]) {
        for attempt in attempts {
            let stats = self.sources.entry(attempt.source_name.clone()).or_default();
            stats.searches += 1;
            if attempt.outcome == AttemptOutcome::Found {
                stats.successes += 1;
            }
        }
    }

    fn count_download(&mut self, result: &DownloadResult) {
        if result.skipped_existing {
            self.summary.skipped_existing += 1;
        }
        let stats = self
            .sources
            .entry(result.task.source_name().to_string())
            .or_default();
        stats.downloads += 1;
        if result.success {
            stats.download_successes += 1;
            if !result.skipped_existing {
                let bytes = result.size_bytes.unwrap_or(0);
                stats.bytes += bytes;
                self.summary.total_bytes += bytes;
            }
        }
    }

    fn push_download_failure(&mut self, title: &str, stage: FailureStage, result: &DownloadResult) {
        let reason = match (&result.error, &result.reason) {
            (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
            (Some(kind), None) => kind.to_string(),
            (None, Some(reason)) => reason.clone(),
            (None, None) => "unknown".to_string(),
        };
        self.failures.push(FailureEntry {
            title: title.to_string(),
            stage,
            source: Some(result.task.source_name().to_string()),
            reason,
        });
    }
}

fn success_entry(result: &DownloadResult) -> SuccessEntry {
    let task = &result.task;
    let record = task.record();
    SuccessEntry {
        title: record.title().to_string(),
        authors: record.formatted_authors(),
        year: record.year(),
        source: task.source_name().to_string(),
        url: task.download_url().to_string(),
        file_path: task.output_path().to_path_buf(),
        size_bytes: result.size_bytes.unwrap_or(0),
        via_fallback: task.origin() == crate::download::TaskOrigin::Fallback,
        skipped_existing: result.skipped_existing,
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    numerator as f64 / denominator.max(1) as f64
}

/// Formats a byte count with binary units, e.g. `1.5 MB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Writes `report` to `logs/download_report_<YYYYmmdd_HHMMSS_mmm>.json`.
///
/// An existing report is never overwritten: a name already taken gets a
/// `_<n>` counter before the extension.
///
/// # Errors
///
/// Returns [`ReportError`] if the logs directory or file cannot be written.
pub fn write_report(report: &Report, layout: &OutputLayout) -> Result<PathBuf, ReportError> {
    let logs_dir = layout.logs_dir();
    std::fs::create_dir_all(&logs_dir).map_err(|source| ReportError::Io {
        path: logs_dir.clone(),
        source,
    })?;

    let stem = format!(
        "download_report_{}",
        report.generated_at.format("%Y%m%d_%H%M%S_%3f")
    );
    let (path, file) = create_unique(&logs_dir, &stem)?;
    let io_error = |source: std::io::Error| ReportError::Io {
        path: path.clone(),
        source,
    };
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().map_err(io_error)?;

    debug!(path = %path.display(), "report written");
    info!(
        records = report.summary.total_records,
        succeeded = report.summary.successful_downloads,
        "run report saved"
    );
    Ok(path)
}

fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, std::fs::File), ReportError> {
    let mut counter = 0u32;
    loop {
        let name = if counter == 0 {
            format!("{stem}.json")
        } else {
            format!("{stem}_{counter}.json")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
            Err(source) => return Err(ReportError::Io { path, source }),
        }
    }
}
