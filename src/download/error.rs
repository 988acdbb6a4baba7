//! Failure types for fetching and persisting one document.
//!
//! [`DownloadError`] is rich and internal; [`FailureKind`] is the flat,
//! serializable classification that ends up in results and reports.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a payload was rejected after it reached disk.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The file is too small to be a real document.
    #[error("file too small ({size} bytes, minimum {minimum})")]
    TooSmall { size: u64, minimum: u64 },

    /// The server returned an HTML page instead of the document.
    #[error("HTML page instead of document (starts with {signature})")]
    HtmlPayload { signature: &'static str },

    #[error("JSON body instead of document")]
    JsonPayload,

    #[error("not a PDF (missing %PDF header)")]
    NotPdf,
}

/// Why a single fetch-and-store attempt failed.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection, DNS, TLS or mid-body transport failure.
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} timed out")]
    Timeout { url: String },

    /// Any response status other than 200, after the single 403 retry.
    #[error("{url} answered HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// Creating, writing or renaming the local file failed.
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not parseable, or not http(s).
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("payload from {url} rejected: {reason}")]
    Validation { url: String, reason: ValidationError },

    /// The run was cancelled while this download was pending or in flight.
    #[error("cancelled while fetching {url}")]
    Cancelled { url: String },
}

impl DownloadError {
    /// Maps a reqwest error, splitting timeouts out of transport failures.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn validation(url: impl Into<String>, reason: ValidationError) -> Self {
        Self::Validation {
            url: url.into(),
            reason,
        }
    }

    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }

    /// Classifies this error for results and reports.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network { .. } => FailureKind::Network,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::HttpStatus { status, .. } => FailureKind::HttpError { status: *status },
            Self::Io { .. } => FailureKind::Filesystem,
            Self::InvalidUrl { .. } => FailureKind::InvalidUrl,
            Self::Validation { .. } => FailureKind::Validation,
            Self::Cancelled { .. } => FailureKind::Cancelled,
        }
    }
}

/// Serializable failure classification carried by download results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    HttpError { status: u16 },
    Validation,
    Filesystem,
    Network,
    Timeout,
    InvalidUrl,
    Cancelled,
    /// The download task panicked or was aborted by the runtime.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpError { status } => write!(f, "http_error({status})"),
            Self::Validation => f.write_str("validation"),
            Self::Filesystem => f.write_str("filesystem"),
            Self::Network => f.write_str("network"),
            Self::Timeout => f.write_str("timeout"),
            Self::InvalidUrl => f.write_str("invalid_url"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}
