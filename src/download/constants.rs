//! Constants for the download module (timeouts, concurrency, validation).

/// Default HTTP connect timeout for document downloads.
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default total timeout for one document request.
pub const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Default number of concurrent downloads.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Minimum allowed concurrency.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency.
pub const MAX_CONCURRENCY: usize = 32;

/// Files smaller than this are never real documents.
pub const MIN_DOCUMENT_BYTES: u64 = 1024;

/// How many leading bytes are inspected for a content signature.
pub const SNIFF_BYTES: usize = 512;

/// Suffix for in-progress downloads. Only validated files lose it.
pub const PARTIAL_SUFFIX: &str = "part";

/// Accept header for document requests.
pub const ACCEPT_DOCUMENT: &str = "application/pdf,application/octet-stream;q=0.9,*/*;q=0.8";

/// Accept-Language header for document requests.
pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
