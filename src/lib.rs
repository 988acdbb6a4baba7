//! paperfetch core library
//!
//! Resolves bibliographic records to validated PDF files. Each record is
//! searched across unreliable providers in priority order, the first usable
//! candidate is downloaded under a concurrency bound, and a failed download
//! gets exactly one fallback round through another provider.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`record`] - the immutable bibliographic record
//! - [`source`] - the provider trait, registry, and built-in adapters
//! - [`search`] - first-match-wins orchestration across sources
//! - [`download`] - bounded-concurrency fetching, validation, persistence
//! - [`sidecar`] - JSON provenance next to each document
//! - [`fallback`] - the single recovery round for failed downloads
//! - [`report`] - run statistics and the persisted report
//! - [`pipeline`] - the `process_records` entry point
//! - [`parser`] / [`config`] - record lists and TOML defaults for the CLI

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod fallback;
pub mod parser;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod search;
pub mod sidecar;
pub mod source;
pub mod user_agent;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, DownloadConfig, DownloadError, DownloadManager, DownloadResult,
    DownloadTask, FailureKind,
};
pub use fallback::{FallbackCoordinator, FallbackOutcome};
pub use pipeline::{Pipeline, PipelineError, SearchSettings};
pub use record::{Record, RecordError};
pub use report::{Report, ReportAggregator};
pub use search::{PacingDelay, SearchOrchestrator, SearchOutcome};
pub use source::{CandidateDocument, SourceAdapter, SourceError, SourceRegistry};
