//! HTTP client wrapper for downloading documents.
//!
//! This module provides the [`HttpClient`] struct which issues document
//! requests with browser headers, performs the single 403 retry, and streams
//! response bodies to disk.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, warn};
use url::Url;

use super::config::{DownloadConfig, EngineError};
use super::constants::{ACCEPT_DOCUMENT, ACCEPT_LANGUAGE as ACCEPT_LANGUAGE_VALUE};
use super::error::DownloadError;
use crate::user_agent::{
    GENERIC_REFERER, rotated_browser_user_agent, rotated_browser_user_agent_excluding,
};

/// The two request shapes a document fetch may use.
///
/// `Primary` sends the target's own origin as Referer. `ForbiddenRetry` is
/// only reached after a 403 on `Primary` and is never followed by another
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStep {
    Primary,
    ForbiddenRetry,
}

/// HTTP client for downloading documents with streaming support.
///
/// Created once per batch and shared by every task, taking advantage of
/// connection pooling.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Builds a client whose idle pool per host matches the download bound.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ClientBuild`] if the TLS backend cannot be
    /// initialized.
    pub fn new(config: &DownloadConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(config.max_concurrent_downloads)
            .gzip(true)
            .build()
            .map_err(EngineError::ClientBuild)?;
        Ok(Self { client })
    }

    /// Requests a document, retrying exactly once on HTTP 403.
    ///
    /// `attempts` is incremented for every request actually sent, so the
    /// caller sees the count even when the fetch fails.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidUrl`] for unparsable or non-http(s) URLs
    /// - [`DownloadError::HttpStatus`] for any final status other than 200
    /// - [`DownloadError::Network`] / [`DownloadError::Timeout`] on transport failure
    #[instrument(skip(self, attempts), fields(url = %url))]
    pub async fn fetch(&self, url: &str, attempts: &mut u32) -> Result<Response, DownloadError> {
        let parsed = parse_document_url(url)?;
        let origin = origin_referer(&parsed);

        let mut step = FetchStep::Primary;
        let mut user_agent = rotated_browser_user_agent();
        loop {
            let referer = match step {
                FetchStep::Primary => origin.as_str(),
                FetchStep::ForbiddenRetry => GENERIC_REFERER,
            };
            *attempts += 1;
            debug!(?step, referer, "requesting document");
            let response = self.send(&parsed, user_agent, referer).await?;

            match (step, response.status()) {
                (_, StatusCode::OK) => return Ok(response),
                (FetchStep::Primary, StatusCode::FORBIDDEN) => {
                    warn!("403 on first attempt, retrying with rotated User-Agent");
                    step = FetchStep::ForbiddenRetry;
                    user_agent = rotated_browser_user_agent_excluding(user_agent);
                }
                (_, status) => return Err(DownloadError::http_status(url, status.as_u16())),
            }
        }
    }

    async fn send(
        &self,
        url: &Url,
        user_agent: &str,
        referer: &str,
    ) -> Result<Response, DownloadError> {
        self.client
            .get(url.clone())
            .header(USER_AGENT, user_agent)
            .header(REFERER, referer)
            .header(ACCEPT, ACCEPT_DOCUMENT)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .send()
            .await
            .map_err(|e| DownloadError::network(url.as_str(), e))
    }
}

fn parse_document_url(url: &str) -> Result<Url, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(DownloadError::invalid_url(url));
    }
    Ok(parsed)
}

/// `scheme://host[:port]/` of the target.
fn origin_referer(url: &Url) -> String {
    format!("{}/", url.origin().ascii_serialization())
}

/// Streams a response body into `file`, returning bytes written.
///
/// The caller owns cleanup of the partial file on error.
pub(crate) async fn stream_to_file(
    file: File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    // Ensure all data is flushed to disk
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
