//! Download configuration and output directory layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DOWNLOAD_TIMEOUT_SECS, MAX_CONCURRENCY,
    MIN_CONCURRENCY, PARTIAL_SUFFIX,
};

/// Errors from validating download configuration or building the manager.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Concurrency outside `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
    #[error(
        "max concurrent downloads must be between {min} and {max}, got {value}",
        min = MIN_CONCURRENCY,
        max = MAX_CONCURRENCY
    )]
    InvalidConcurrency { value: usize },

    /// A timeout of zero seconds.
    #[error("{name} timeout must be at least one second")]
    InvalidTimeout { name: &'static str },

    /// The HTTP client could not be built.
    #[error("failed to build download HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Settings for one download batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Root directory; documents land in `pdfs/`, sidecars in `metadata/`.
    pub output_dir: PathBuf,
    /// Semaphore bound on simultaneous transfers.
    pub max_concurrent_downloads: usize,
    /// Re-download even when the output path already exists.
    pub overwrite_existing: bool,
    /// Write a JSON sidecar next to each document.
    pub save_metadata: bool,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            max_concurrent_downloads: DEFAULT_CONCURRENCY,
            overwrite_existing: false,
            save_metadata: true,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            timeout_secs: DOWNLOAD_TIMEOUT_SECS,
        }
    }
}

impl DownloadConfig {
    /// Default settings rooted at `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for an out-of-range concurrency or a zero timeout.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&self.max_concurrent_downloads) {
            return Err(EngineError::InvalidConcurrency {
                value: self.max_concurrent_downloads,
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(EngineError::InvalidTimeout { name: "connect" });
        }
        if self.timeout_secs == 0 {
            return Err(EngineError::InvalidTimeout { name: "download" });
        }
        Ok(())
    }

    #[must_use]
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir)
    }
}

/// Directory layout under the output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn pdf_dir(&self) -> PathBuf {
        self.root.join("pdfs")
    }

    #[must_use]
    pub fn metadata_dir(&self) -> PathBuf {
        self.root.join("metadata")
    }

    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Final path of a document file.
    #[must_use]
    pub fn pdf_path(&self, filename: &str) -> PathBuf {
        self.pdf_dir().join(filename)
    }

    /// Sidecar path sharing the document's base name.
    #[must_use]
    pub fn metadata_path_for(&self, document: &Path) -> PathBuf {
        let stem = document
            .file_stem()
            .map_or_else(|| "document".into(), |stem| stem.to_string_lossy());
        self.metadata_dir().join(format!("{stem}.json"))
    }

    /// Creates `pdfs/`, `metadata/` and `logs/`.
    ///
    /// # Errors
    ///
    /// Returns the first directory creation error.
    pub async fn ensure(&self) -> std::io::Result<()> {
        for dir in [self.pdf_dir(), self.metadata_dir(), self.logs_dir()] {
            tokio::fs::create_dir_all(&dir).await?;
            debug!(path = %dir.display(), "output directory ready");
        }
        Ok(())
    }
}

/// In-progress path for a document: `<name>.pdf.part`.
#[must_use]
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    final_path.with_file_name(name)
}
