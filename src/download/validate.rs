//! Payload validation for downloaded documents.
//!
//! Hosts often answer a document URL with a login page, a captcha, or a JSON
//! error body and a 200 status. The bytes on disk are the only reliable
//! signal, so every download is sniffed before it is kept.

use std::path::Path;

use tokio::io::AsyncReadExt;

use super::constants::{MIN_DOCUMENT_BYTES, SNIFF_BYTES};
use super::error::{DownloadError, ValidationError};

const PDF_MAGIC: &[u8] = b"%PDF";

const HTML_SIGNATURES: [&str; 3] = ["<!doctype html", "<html", "<head"];

/// Checks a payload's leading bytes and total size.
///
/// Rules, in order:
/// 1. size below [`MIN_DOCUMENT_BYTES`] is rejected
/// 2. a `%PDF` header is accepted
/// 3. an HTML or JSON signature is rejected with that reason
/// 4. anything else is rejected as not a PDF
///
/// # Errors
///
/// Returns the [`ValidationError`] describing the first rule that failed.
pub fn inspect_head(head: &[u8], size: u64) -> Result<(), ValidationError> {
    if size < MIN_DOCUMENT_BYTES {
        return Err(ValidationError::TooSmall {
            size,
            minimum: MIN_DOCUMENT_BYTES,
        });
    }
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }

    let text = String::from_utf8_lossy(head);
    let lowered = text.trim_start().to_ascii_lowercase();
    if let Some(signature) = HTML_SIGNATURES
        .into_iter()
        .find(|signature| lowered.starts_with(signature))
    {
        return Err(ValidationError::HtmlPayload { signature });
    }
    if lowered.starts_with('{') {
        return Err(ValidationError::JsonPayload);
    }
    Err(ValidationError::NotPdf)
}

/// Validates a file on disk and returns its size.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the file cannot be read and
/// [`DownloadError::Validation`] if the content is rejected.
pub async fn validate_file(path: &Path, url: &str) -> Result<u64, DownloadError> {
    let size = tokio::fs::metadata(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?
        .len();

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_BYTES);
    (&mut file)
        .take(SNIFF_BYTES as u64)
        .read_to_end(&mut head)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    inspect_head(&head, size).map_err(|reason| DownloadError::validation(url, reason))?;
    Ok(size)
}
