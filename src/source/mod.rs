//! Source adapters: uniform search access to external document providers.
//!
//! Each provider (arXiv, Zenodo, DOAJ, Semantic Scholar) implements [`SourceAdapter`] and
//! normalizes its own response schema into [`CandidateDocument`]s. The search
//! orchestrator only ever talks to the trait.
//!
//! # Architecture
//!
//! - [`SourceAdapter`] - async trait every provider implements
//! - [`SourceRegistry`] - name lookup, priority validation, availability probes
//! - [`RequestPacer`] - per-adapter minimum interval between requests
//! - [`ArxivSource`], [`ZenodoSource`], [`DoajSource`],
//!   [`SemanticScholarSource`] - built-in adapters

mod arxiv;
mod doaj;
mod http_client;
mod pacer;
mod registry;
mod semantic_scholar;
mod zenodo;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use arxiv::{ARXIV_API_URL, ArxivSource};
pub use doaj::{DOAJ_API_URL, DoajSource};
pub use http_client::{SEARCH_CONNECT_TIMEOUT_SECS, SEARCH_TIMEOUT_SECS, build_search_client};
pub use pacer::{MAX_MIN_INTERVAL, MIN_MIN_INTERVAL, RequestPacer};
pub use registry::{PriorityError, SourceRegistry};
pub use semantic_scholar::{SEMANTIC_SCHOLAR_API_URL, SemanticScholarSource};
pub use zenodo::{ZENODO_API_URL, ZenodoSource};

/// A normalized search result from one source.
///
/// String fields are never absent: a missing value is an empty string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
    /// Name of the adapter that produced this candidate.
    pub source_name: String,
    /// Landing page for the document.
    pub document_url: String,
    /// Direct link to the file; empty when the source has none.
    pub download_url: String,
    /// Whether the source marks the document as open access.
    pub open_access: bool,
    /// Title as reported by the source.
    pub title: String,
    /// Provider-specific fields the core never reads.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CandidateDocument {
    /// Creates a candidate with empty optional fields.
    #[must_use]
    pub fn new(source_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            document_url: String::new(),
            download_url: String::new(),
            open_access: false,
            title: title.into(),
            extra: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_document_url(mut self, url: impl Into<String>) -> Self {
        self.document_url = url.into();
        self
    }

    #[must_use]
    pub fn with_download_url(mut self, url: impl Into<String>) -> Self {
        self.download_url = url.into();
        self
    }

    #[must_use]
    pub fn with_open_access(mut self, open_access: bool) -> Self {
        self.open_access = open_access;
        self
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Returns true when the candidate carries a usable direct download link.
    #[must_use]
    pub fn has_download_url(&self) -> bool {
        !self.download_url.trim().is_empty()
    }
}

/// Errors raised inside a source adapter.
///
/// These never escape the search layer: the orchestrator records them as an
/// `Error` attempt and moves on to the next source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Transport-level failure talking to the provider.
    #[error("{source_name}: request failed: {source}")]
    Http {
        source_name: String,
        #[source]
        source: reqwest::Error,
    },

    /// The provider did not answer within the search timeout.
    #[error("{source_name}: request timed out")]
    Timeout { source_name: String },

    /// The provider answered with a non-success status.
    #[error("{source_name}: HTTP {status}")]
    HttpStatus { source_name: String, status: u16 },

    /// The response body could not be parsed.
    #[error("{source_name}: parse error: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    /// The adapter could not be constructed.
    #[error("{source_name}: client setup failed: {message}")]
    Setup {
        source_name: String,
        message: String,
    },
}

impl SourceError {
    /// Maps a reqwest error, separating timeouts from other transport errors.
    pub fn http(source_name: impl Into<String>, source: reqwest::Error) -> Self {
        let source_name = source_name.into();
        if source.is_timeout() {
            Self::Timeout { source_name }
        } else {
            Self::Http {
                source_name,
                source,
            }
        }
    }

    pub fn http_status(source_name: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            source_name: source_name.into(),
            status,
        }
    }

    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn setup(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Setup {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// A searchable document provider.
///
/// Implementations must pace their own requests (see [`RequestPacer`]) and
/// must be safe to share across concurrently running record searches.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable lowercase name used in priority lists, filenames, and reports.
    fn name(&self) -> &str;

    /// Searches the provider, surfacing failures.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] on transport, status, or parse failures.
    async fn try_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateDocument>, SourceError>;

    /// Searches the provider. Never fails: errors become an empty list.
    async fn search(&self, query: &str, limit: usize) -> Vec<CandidateDocument> {
        match self.try_search(query, limit).await {
            Ok(candidates) => {
                debug!(source = self.name(), count = candidates.len(), "search finished");
                candidates
            }
            Err(error) => {
                warn!(source = self.name(), error = %error, "search failed, treating as no results");
                Vec::new()
            }
        }
    }

    /// Lightweight reachability check.
    async fn check_availability(&self) -> bool;
}

impl fmt::Debug for dyn SourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SourceAdapter").field(&self.name()).finish()
    }
}
