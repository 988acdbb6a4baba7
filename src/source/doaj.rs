//! DOAJ (Directory of Open Access Journals) article search adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{CandidateDocument, RequestPacer, SourceAdapter, SourceError, build_search_client};

/// Public DOAJ article search endpoint. The query is the last path segment.
pub const DOAJ_API_URL: &str = "https://doaj.org/api/search/articles";

const SOURCE_NAME: &str = "doaj";

const DOAJ_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// DOAJ caps `pageSize` at 100.
const MAX_PAGE_SIZE: usize = 100;

/// Searches journal articles indexed by DOAJ. Every hit is open access.
#[derive(Debug)]
pub struct DoajSource {
    client: Client,
    base_url: String,
    pacer: RequestPacer,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    #[serde(default)]
    id: String,
    #[serde(default)]
    bibjson: BibJson,
}

#[derive(Debug, Default, Deserialize)]
struct BibJson {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: Vec<Author>,
    #[serde(default)]
    year: Option<String>,
    #[serde(default)]
    identifier: Vec<Identifier>,
    #[serde(default)]
    link: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Author {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Identifier {
    #[serde(default, rename = "type")]
    id_type: String,
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    url: String,
    #[serde(default, rename = "type")]
    link_type: String,
}

impl DoajSource {
    /// Creates an adapter for the public DOAJ API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Setup`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(DOAJ_API_URL, DOAJ_MIN_INTERVAL)
    }

    /// Creates an adapter against a custom article search endpoint.
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

    fn query_url(&self, query: &str, page_size: usize) -> Result<Url, SourceError> {
        let bad_base = |detail: &str| SourceError::setup(SOURCE_NAME, format!("bad base URL: {detail}"));
        let mut url = Url::parse(&self.base_url).map_err(|e| bad_base(&e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| bad_base("cannot carry a path"))?
            .pop_if_empty()
            .push(query);
        url.query_pairs_mut()
            .append_pair("pageSize", &page_size.clamp(1, MAX_PAGE_SIZE).to_string());
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, SourceError> {
        self.pacer.wait().await;
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| SourceError::http(SOURCE_NAME, e))
    }
}

#[async_trait]
impl SourceAdapter for DoajSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    #[instrument(skip(self), fields(source = SOURCE_NAME))]
    async fn try_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateDocument>, SourceError> {
        let response = self.get(self.query_url(query, limit)?).await?;
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
        debug!(count = candidates.len(), "parsed DOAJ response");
        Ok(candidates)
    }

    async fn check_availability(&self) -> bool {
        let Ok(url) = self.query_url("science", 1) else {
            return false;
        };
        self.get(url)
            .await
            .is_ok_and(|response| response.status().is_success())
    }
}

/// Maps a DOAJ search response to candidates.
///
/// Only a `fulltext` link that looks like a PDF becomes the download URL; any
/// other full-text link is kept as the landing page.
pub(crate) fn parse_search_response(body: &str) -> Result<Vec<CandidateDocument>, SourceError> {
    let response: SearchResponse =
        serde_json::from_str(body).map_err(|e| SourceError::parse(SOURCE_NAME, e.to_string()))?;
    Ok(response
        .results
        .into_iter()
        .filter(|article| !article.bibjson.title.trim().is_empty())
        .map(into_candidate)
        .collect())
}

fn into_candidate(article: Article) -> CandidateDocument {
    let bib = article.bibjson;
    let fulltext: Vec<&str> = bib
        .link
        .iter()
        .filter(|link| link.link_type.eq_ignore_ascii_case("fulltext") && !link.url.is_empty())
        .map(|link| link.url.as_str())
        .collect();
    let download_url = fulltext
        .iter()
        .find(|url| url.to_ascii_lowercase().contains("pdf"))
        .copied()
        .unwrap_or_default();
    let document_url = fulltext
        .iter()
        .find(|url| **url != download_url)
        .or_else(|| fulltext.first())
        .copied()
        .unwrap_or_default();
    let authors: Vec<&str> = bib
        .author
        .iter()
        .map(|author| author.name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    let doi = bib
        .identifier
        .iter()
        .find(|identifier| identifier.id_type.eq_ignore_ascii_case("doi"))
        .map(|identifier| identifier.id.trim())
        .filter(|doi| !doi.is_empty());

    let mut candidate = CandidateDocument::new(SOURCE_NAME, bib.title.trim())
        .with_document_url(document_url)
        .with_download_url(download_url)
        .with_open_access(true)
        .with_extra("authors", serde_json::json!(authors))
        .with_extra("doaj_id", serde_json::json!(article.id));
    if let Some(doi) = doi {
        candidate = candidate.with_extra("doi", serde_json::json!(doi));
    }
    if let Some(year) = bib.year.as_deref().map(str::trim).filter(|y| !y.is_empty()) {
        candidate = candidate.with_extra("year", serde_json::json!(year));
    }
    candidate
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE_RESPONSE: &str = r#"{
      "total": 2,
      "results": [
        {
          "id": "a1b2",
          "bibjson": {
            "title": "Graph Neural Networks in Chemistry",
            "year": "2022",
            "author": [{"name": "Ada Lovelace"}, {"name": ""}],
            "identifier": [{"type": "eissn", "id": "1234-5678"}, {"type": "doi", "id": "10.1000/gnn.2022"}],
            "link": [
              {"type": "fulltext", "url": "https://journal.example/article/7", "content_type": "HTML"},
              {"type": "fulltext", "url": "https://journal.example/article/7/pdf"}
            ]
          }
        },
        {
          "id": "c3d4",
          "bibjson": {
            "title": "Landing Page Only",
            "link": [{"type": "fulltext", "url": "https://journal.example/article/8"}]
          }
        },
        {"id": "e5f6", "bibjson": {"title": ""}}
      ]
    }"#;

    #[test]
    fn test_parse_picks_pdf_fulltext_link() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert_eq!(candidates.len(), 2);
        let first = &candidates[0];
        assert_eq!(first.download_url, "https://journal.example/article/7/pdf");
        assert_eq!(first.document_url, "https://journal.example/article/7");
        assert_eq!(first.extra["doi"], "10.1000/gnn.2022");
        assert_eq!(first.extra["authors"], serde_json::json!(["Ada Lovelace"]));
        assert!(first.open_access);
    }

    #[test]
    fn test_parse_html_only_fulltext_has_no_download_url() {
        let candidates = parse_search_response(SAMPLE_RESPONSE).unwrap();
        assert!(!candidates[1].has_download_url());
        assert_eq!(candidates[1].document_url, "https://journal.example/article/8");
    }

    #[test]
    fn test_parse_empty_and_invalid_bodies() {
        assert!(parse_search_response("{}").unwrap().is_empty());
        assert!(matches!(
            parse_search_response("[1, 2"),
            Err(SourceError::Parse { .. })
        ));
    }

    #[test]
    fn test_query_is_an_encoded_path_segment() {
        let source =
            DoajSource::with_base_url("https://doaj.org/api/search/articles/", Duration::ZERO).unwrap();
        let url = source.query_url("graph networks/chemistry", 500).unwrap();
        assert_eq!(
            url.as_str(),
            "https://doaj.org/api/search/articles/graph%20networks%2Fchemistry?pageSize=100"
        );
    }
}
