//! Document download engine.
//!
//! This module turns resolved download URLs into validated documents on disk.
//!
//! # Features
//!
//! - Bounded concurrency via a shared semaphore
//! - Exactly one retry, only for HTTP 403, with a rotated browser identity
//! - Streaming writes into `.part` files, renamed only after validation
//! - Skip-if-exists idempotence and per-path serialization
//! - Best-effort JSON metadata sidecars
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use paperfetch_core::download::{DownloadConfig, DownloadManager, DownloadTask};
//! use paperfetch_core::Record;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DownloadConfig::new("./downloads");
//! let layout = config.layout();
//! let manager = DownloadManager::new(config)?;
//! let record = Arc::new(Record::new("Attention Is All You Need", vec![])?);
//! let task = DownloadTask::new(
//!     record,
//!     "arxiv",
//!     "https://arxiv.org/pdf/1706.03762",
//!     layout.pdf_path("attention_arxiv.pdf"),
//! );
//! let results = manager.download_batch(vec![task], &CancellationToken::new()).await;
//! println!("success: {}", results[0].success);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod constants;
mod engine;
mod error;
mod filename;
mod path_lock;
mod task;
mod validate;

pub use client::{FetchStep, HttpClient};
pub use config::{DownloadConfig, EngineError, OutputLayout, partial_path};
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DOWNLOAD_TIMEOUT_SECS, MAX_CONCURRENCY,
    MIN_CONCURRENCY, MIN_DOCUMENT_BYTES,
};
pub use engine::{DownloadManager, DownloadResult, DownloadStats};
pub use error::{DownloadError, FailureKind, ValidationError};
pub use filename::{MAX_TITLE_CHARS, filename_stem, generate_filename};
pub use path_lock::{PathGuard, PathLocks};
pub use task::{DownloadTask, TaskOrigin, TaskState, TransitionError};
pub use validate::{inspect_head, validate_file};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
