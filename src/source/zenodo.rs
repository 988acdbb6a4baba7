//! Zenodo source adapter backed by the records REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CandidateDocument, RequestPacer, SourceAdapter, SourceError, build_search_client};

/// Public Zenodo records endpoint.
pub const ZENODO_API_URL: &str = "https://zenodo.org/api/records";

const SOURCE_NAME: &str = "zenodo";

const ZENODO_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Searches open-access publications on Zenodo.
#[derive(Debug)]
pub struct ZenodoSource {
    client: Client,
    base_url: String,
    pacer: RequestPacer,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Hits,
}

#[derive(Debug, Default, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<ZenodoRecord>,
}

#[derive(Debug, Deserialize)]
struct ZenodoRecord {
    #[serde(default)]
    id: serde_json::Value,
    #[serde(default)]
    metadata: RecordMetadata,
    #[serde(default)]
    links: RecordLinks,
    #[serde(default)]
    files: Vec<RecordFile>,
}

#[derive(Debug, Default, Deserialize)]
struct RecordMetadata {
    #[serde(default)]
    title: String,
    #[serde(default)]
    doi: String,
    #[serde(default)]
    publication_date: String,
    #[serde(default)]
    creators: Vec<Creator>,
    #[serde(default)]
    access_right: String,
}

#[derive(Debug, Deserialize)]
struct Creator {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct RecordLinks {
    #[serde(default)]
    html: String,
    #[serde(default, rename = "self")]
    self_link: String,
}

#[derive(Debug, Deserialize)]
struct RecordFile {
    #[serde(default)]
    key: String,
    #[serde(default, rename = "type")]
    file_type: String,
    #[serde(default)]
    links: FileLinks,
}

#[derive(Debug, Default, Deserialize)]
struct FileLinks {
    #[serde(default, rename = "self")]
    self_link: String,
}

impl RecordFile {
    fn is_pdf(&self) -> bool {
        self.file_type.eq_ignore_ascii_case("pdf") || self.key.to_ascii_lowercase().ends_with(".pdf")
    }
}

impl ZenodoSource {
    /// Creates an adapter for the public Zenodo API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Setup`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(ZENODO_API_URL, ZENODO_MIN_INTERVAL)
    }

    /// Creates an adapter against a custom records endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Setup`] if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: impl Into<String>,
        min_interval: Duration,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_search_client(SOURCE_NAME)?,
            base_url: base_url.into(),
            pacer: RequestPacer::new(SOURCE_NAME, min_interval),
        })
    }

    fn query_url(&self, params: &[(&str, String)]) -> Result<Url, SourceError> {
        Url::parse_with_params(&self.base_url, params)
            .map_err(|e| SourceError::setup(SOURCE_NAME, format!("bad base URL: {e}")))
    }
}

#[async_trait]
impl SourceAdapter for ZenodoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(skip(self), fields(source = SOURCE_NAME))]
    async fn try_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateDocument>, SourceError> {
        let url = self.query_url(&[
            ("q", query.to_string()),
            ("size", limit.to_string()),
            ("sort", "bestmatch".to_string()),
            ("access_right", "open".to_string()),
            ("type", "publication".to_string()),
        ])?;

        self.pacer.wait().await;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::http(SOURCE_NAME, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::http_status(SOURCE_NAME, status.as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::http(SOURCE_NAME, e))?;

        let mut candidates = parse_search_response(&body)?;
        candidates.truncate(limit);
        debug!(count = candidates.len(), "parsed Zenodo response");
        Ok(candidates)
    }

    async fn check_availability(&self) -> bool {
        let Ok(url) = self.query_url(&[("size", "1".to_string())]) else {
            return false;
        };
        self.pacer.wait().await;
        self.client
            .get(url)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }
}

/// Maps a Zenodo search response to candidates.
///
/// The download link is the first PDF file; records with files but no PDF
/// fall back to their first file link so validation can decide.
pub(crate) fn parse_search_response(body: &str) -> Result<Vec<CandidateDocument>, SourceError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?;

    Ok(response
        .hits
        .hits
        .into_iter()
        .filter(|record| !record.metadata.title.trim().is_empty())
        .map(into_candidate)
        .collect())
}

fn into_candidate(record: ZenodoRecord) -> CandidateDocument {
    let download_url = record
        .files
        .iter()
        .find(|file| file.is_pdf() && !file.links.self_link.is_empty())
        .or_else(|| record.files.iter().find(|file| !file.links.self_link.is_empty()))
        .map(|file| file.links.self_link.clone())
        .unwrap_or_default();
    let document_url = if record.links.html.is_empty() {
        record.links.self_link
    } else {
        record.links.html
    };
    let open_access = record.metadata.access_right.is_empty()
        || record.metadata.access_right.eq_ignore_ascii_case("open");
    let authors: Vec<String> = record
        .metadata
        .creators
        .into_iter()
        .map(|creator| creator.name)
        .filter(|name| !name.is_empty())
        .collect();

    let mut candidate = CandidateDocument::new(SOURCE_NAME, record.metadata.title.trim())
        .with_document_url(document_url)
        .with_download_url(download_url)
        .with_open_access(open_access)
        .with_extra("authors", serde_json::json!(authors))
        .with_extra("record_id", record.id);
    if !record.metadata.doi.is_empty() {
        candidate = candidate.with_extra("doi", serde_json::json!(record.metadata.doi));
    }
    if !record.metadata.publication_date.is_empty() {
        candidate = candidate.with_extra(
            "published",
            serde_json::json!(record.metadata.publication_date),
        );
    }
    candidate
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
      "hits": {
        "hits": [
          {
            "id": 1234,
            "metadata": {
              "title": "Open Climate Dataset",
              "doi": "10.5281/zenodo.1234",
              "publication_date": "2021-03-01",
              "creators": [{"name": "Doe, Jane"}],
              "access_right": "open"
            },
            "links": {"html": "https://zenodo.org/records/1234"},
            "files": [
              {"key": "data.csv", "type": "csv", "links": {"self": "https://zenodo.org/files/data.csv"}},
              {"key": "paper.PDF", "links": {"self": "https://zenodo.org/files/paper.PDF"}}
            ]
          },
          {
            "id": 99,
            "metadata": {"title": "Metadata Only"},
            "links": {"self": "https://zenodo.org/api/records/99"}
          },
          {
            "id": 100,
            "metadata": {"title": "  "}
          }
        ]
      }
    }"#;

    #[test]
    fn test_parse_prefers_pdf_file_link() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert_eq!(candidates[0].download_url, "https://zenodo.org/files/paper.PDF");
        assert_eq!(candidates[0].document_url, "https://zenodo.org/records/1234");
        assert_eq!(candidates[0].extra["doi"], "10.5281/zenodo.1234");
        assert!(candidates[0].open_access);
    }

    #[test]
    fn test_parse_record_without_files_has_empty_download_url() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert_eq!(candidates[1].title, "Metadata Only");
        assert!(!candidates[1].has_download_url());
        assert_eq!(candidates[1].document_url, "https://zenodo.org/api/records/99");
    }

    #[test]
    fn test_parse_skips_untitled_records() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_parse_missing_hits_is_empty() {
        assert!(parse_search_response("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json_is_parse_error() {
        assert!(matches!(
            parse_search_response("<html>"),
            Err(SourceError::Parse { .. })
        ));
    }
}
