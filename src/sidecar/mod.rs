//! JSON metadata sidecar files for downloaded documents.
//!
//! Each stored document gets `metadata/<base>.json` recording where it came
//! from. Sidecars are best effort: a failure here is logged by the caller and
//! never fails the download.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::download::DownloadTask;

/// Errors produced by sidecar generation.
#[derive(Debug, Error)]
pub enum SidecarError {
    /// I/O error writing the sidecar file to disk.
    #[error("I/O error writing sidecar {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// JSON serialization error (shouldn't occur for well-formed structs).
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Provenance written next to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub source: String,
    pub download_url: String,
    pub file_path: PathBuf,
    pub file_size: u64,
    pub downloaded_at: DateTime<Utc>,
}

impl SidecarMetadata {
    /// Captures a completed task's provenance.
    #[must_use]
    pub fn from_task(task: &DownloadTask, file_size: u64) -> Self {
        let record = task.record();
        Self {
            title: record.title().to_string(),
            authors: record.authors().to_vec(),
            year: record.year(),
            journal: record.journal().map(str::to_string),
            doi: record.doi().map(str::to_string),
            source: task.source_name().to_string(),
            download_url: task.download_url().to_string(),
            file_path: task.output_path().to_path_buf(),
            file_size,
            downloaded_at: Utc::now(),
        }
    }
}

/// Writes `metadata` to `sidecar_path`, replacing any previous sidecar.
///
/// A partially written file is removed before the error is returned.
///
/// # Errors
///
/// Returns [`SidecarError`] on I/O or serialization failure.
#[instrument(skip(metadata), fields(path = %sidecar_path.display()))]
pub fn write_sidecar(sidecar_path: &Path, metadata: &SidecarMetadata) -> Result<(), SidecarError> {
    let io_error = |source: std::io::Error| SidecarError::Io {
        path: sidecar_path.to_path_buf(),
        source,
    };

    if let Some(parent) = sidecar_path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let file = fs::File::create(sidecar_path).map_err(io_error)?;

    let write_result = {
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, metadata)
            .map_err(SidecarError::from)
            .and_then(|()| writer.flush().map_err(io_error))
    };
    if let Err(err) = write_result {
        // Best-effort cleanup so a truncated sidecar is not left behind.
        let _ = fs::remove_file(sidecar_path);
        return Err(err);
    }

    debug!("sidecar written");
    Ok(())
}
