//! Semantic Scholar Graph API adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CandidateDocument, RequestPacer, SourceAdapter, SourceError, build_search_client};

/// Public paper search endpoint of the Graph API.
pub const SEMANTIC_SCHOLAR_API_URL: &str = "https://api.semanticscholar.org/graph/v1/paper/search";

const SOURCE_NAME: &str = "semantic_scholar";

/// Unauthenticated clients share a small global quota.
const SEMANTIC_SCHOLAR_MIN_INTERVAL: Duration = Duration::from_secs(1);

const MAX_LIMIT: usize = 100;

const FIELDS: &str = "title,authors,year,externalIds,url,openAccessPdf,isOpenAccess";

/// Searches Semantic Scholar, using its open-access PDF links for download.
#[derive(Debug)]
pub struct SemanticScholarSource {
    client: Client,
    base_url: String,
    pacer: RequestPacer,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Paper>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paper {
    #[serde(default)]
    paper_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    external_ids: Option<ExternalIds>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    open_access_pdf: Option<OpenAccessPdf>,
    #[serde(default)]
    is_open_access: bool,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ExternalIds {
    #[serde(default, rename = "DOI")]
    doi: Option<String>,
    #[serde(default, rename = "ArXiv")]
    arxiv: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAccessPdf {
    #[serde(default)]
    url: Option<String>,
}

impl SemanticScholarSource {
    /// Creates an adapter for the public Graph API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Setup`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(SEMANTIC_SCHOLAR_API_URL, SEMANTIC_SCHOLAR_MIN_INTERVAL)
    }

    /// Creates an adapter against a custom paper search endpoint.
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
impl SourceAdapter for SemanticScholarSource {
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
            ("query", query.to_string()),
            ("limit", limit.clamp(1, MAX_LIMIT).to_string()),
            ("fields", FIELDS.to_string()),
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
        debug!(count = candidates.len(), "parsed Semantic Scholar response");
        Ok(candidates)
    }

    async fn check_availability(&self) -> bool {
        let Ok(url) = self.query_url(&[
            ("query", "science".to_string()),
            ("limit", "1".to_string()),
        ]) else {
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

pub(crate) fn parse_search_response(body: &str) -> Result<Vec<CandidateDocument>, SourceError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?;
    Ok(response.data.into_iter().filter_map(into_candidate).collect())
}

fn into_candidate(paper: Paper) -> Option<CandidateDocument> {
    let title = paper.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let pdf_url = paper
        .open_access_pdf
        .and_then(|pdf| pdf.url)
        .map(|url| url.trim().to_string())
        .unwrap_or_default();
    let authors: Vec<String> = paper
        .authors
        .into_iter()
        .filter_map(|author| author.name)
        .filter(|name| !name.trim().is_empty())
        .collect();
    let ids = paper.external_ids.unwrap_or_default();

    let mut candidate = CandidateDocument::new(SOURCE_NAME, title)
        .with_document_url(paper.url.unwrap_or_default())
        .with_open_access(paper.is_open_access || !pdf_url.is_empty())
        .with_download_url(pdf_url)
        .with_extra("authors", serde_json::json!(authors))
        .with_extra("paper_id", serde_json::json!(paper.paper_id));
    if let Some(year) = paper.year {
        candidate = candidate.with_extra("year", serde_json::json!(year));
    }
    if let Some(doi) = ids.doi.filter(|doi| !doi.is_empty()) {
        candidate = candidate.with_extra("doi", serde_json::json!(doi));
    }
    if let Some(arxiv) = ids.arxiv.filter(|id| !id.is_empty()) {
        candidate = candidate.with_extra("arxiv_id", serde_json::json!(arxiv));
    }
    Some(candidate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
      "total": 3,
      "offset": 0,
      "data": [
        {
          "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
          "title": "Attention is All you Need",
          "year": 2017,
          "authors": [{"authorId": "40348417", "name": "Ashish Vaswani"}, {"name": null}],
          "externalIds": {"DOI": "10.48550/arXiv.1706.03762", "ArXiv": "1706.03762"},
          "url": "https://www.semanticscholar.org/paper/204e3073",
          "openAccessPdf": {"url": "https://arxiv.org/pdf/1706.03762", "status": "GREEN"},
          "isOpenAccess": true
        },
        {
          "paperId": "abc",
          "title": "Closed Access Paper",
          "authors": [],
          "openAccessPdf": null,
          "isOpenAccess": false
        },
        {"paperId": "def", "title": null}
      ]
    }"#;

    #[test]
    fn test_parse_uses_open_access_pdf() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert_eq!(candidates.len(), 2);
        let first = &candidates[0];
        assert_eq!(first.source_name, "semantic_scholar");
        assert_eq!(first.download_url, "https://arxiv.org/pdf/1706.03762");
        assert_eq!(first.extra["arxiv_id"], "1706.03762");
        assert_eq!(first.extra["authors"], serde_json::json!(["Ashish Vaswani"]));
        assert!(first.open_access);
    }

    #[test]
    fn test_parse_closed_paper_has_no_download_url() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert!(!candidates[1].has_download_url());
        assert!(!candidates[1].open_access);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_search_response("Too Many Requests"),
            Err(SourceError::Parse { .. })
        ));
        assert!(parse_search_response("{}").unwrap().is_empty());
    }
}
