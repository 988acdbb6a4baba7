//! arXiv source adapter backed by the export Atom API.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use super::{CandidateDocument, RequestPacer, SourceAdapter, SourceError, build_search_client};

/// Public arXiv query endpoint.
pub const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

const SOURCE_NAME: &str = "arxiv";

/// arXiv asks clients to wait three seconds between calls.
const ARXIV_MIN_INTERVAL: Duration = Duration::from_secs(3);

/// Searches arXiv and maps Atom entries to candidates.
#[derive(Debug)]
pub struct ArxivSource {
    client: Client,
    base_url: String,
    pacer: RequestPacer,
}

impl ArxivSource {
    /// Creates an adapter for the public arXiv API.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Setup`] if the HTTP client cannot be built.
    pub fn new() -> Result<Self, SourceError> {
        Self::with_base_url(ARXIV_API_URL, ARXIV_MIN_INTERVAL)
    }

    /// Creates an adapter against a custom endpoint (mirrors, tests).
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
impl SourceAdapter for ArxivSource {
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
            ("search_query", format!("all:{query}")),
            ("start", "0".to_string()),
            ("max_results", limit.to_string()),
            ("sortBy", "relevance".to_string()),
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

        let mut candidates = parse_atom_feed(&body)?;
        candidates.truncate(limit);
        debug!(count = candidates.len(), "parsed arXiv feed");
        Ok(candidates)
    }

    async fn check_availability(&self) -> bool {
        let Ok(url) = self.query_url(&[("max_results", "1".to_string())]) else {
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

#[derive(Default)]
struct EntryState {
    title: String,
    id: String,
    pdf_link: String,
    abs_link: String,
    authors: Vec<String>,
    author_name: String,
    published: String,
}

impl EntryState {
    fn into_candidate(self) -> Option<CandidateDocument> {
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return None;
        }
        let arxiv_id = self.id.rsplit('/').next().unwrap_or_default().to_string();
        let document_url = if self.abs_link.is_empty() {
            self.id.trim().to_string()
        } else {
            self.abs_link
        };
        let mut candidate = CandidateDocument::new(SOURCE_NAME, title)
            .with_document_url(document_url)
            .with_download_url(self.pdf_link)
            .with_open_access(true)
            .with_extra("authors", serde_json::json!(self.authors));
        if !arxiv_id.is_empty() {
            candidate = candidate.with_extra("arxiv_id", serde_json::json!(arxiv_id.trim()));
        }
        if !self.published.trim().is_empty() {
            candidate = candidate.with_extra("published", serde_json::json!(self.published.trim()));
        }
        Some(candidate)
    }

    fn absorb_link(&mut self, element: &BytesStart<'_>) {
        let mut href = String::new();
        let mut title = String::new();
        for attr in element.attributes().flatten() {
            let value = String::from_utf8_lossy(&attr.value).to_string();
            match attr.key.as_ref() {
                b"href" => href = value,
                b"title" => title = value,
                _ => {}
            }
        }
        if title == "pdf" {
            self.pdf_link = href;
        } else if self.abs_link.is_empty() && href.contains("/abs/") {
            self.abs_link = href;
        }
    }
}

/// Parses an arXiv Atom feed into candidates, one per `<entry>`.
pub(crate) fn parse_atom_feed(xml: &str) -> Result<Vec<CandidateDocument>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut candidates = Vec::new();
    let mut entry: Option<EntryState> = None;
    let mut current_tag = Vec::new();
    let mut in_author = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let tag = e.local_name().as_ref().to_vec();
                if tag.as_slice() == b"entry" {
                    entry = Some(EntryState::default());
                } else if let Some(state) = entry.as_mut() {
                    match tag.as_slice() {
                        b"author" => {
                            in_author = true;
                            state.author_name.clear();
                        }
                        b"link" => state.absorb_link(&e),
                        _ => {}
                    }
                }
                current_tag = tag;
            }
            Ok(Event::Empty(e)) => {
                if let Some(state) = entry.as_mut()
                    && e.local_name().as_ref() == b"link"
                {
                    state.absorb_link(&e);
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(state) = entry.as_mut() {
                    let text = e
                        .unescape()
                        .map_err(|err| SourceError::parse(SOURCE_NAME, err.to_string()))?;
                    match current_tag.as_slice() {
                        b"title" => state.title.push_str(&text),
                        b"id" => state.id.push_str(&text),
                        b"published" => state.published.push_str(&text),
                        b"name" if in_author => state.author_name.push_str(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"entry" => {
                        if let Some(candidate) = entry.take().and_then(EntryState::into_candidate)
                        {
                            candidates.push(candidate);
                        }
                    }
                    b"author" => {
                        in_author = false;
                        if let Some(state) = entry.as_mut() {
                            let name = state.author_name.trim().to_string();
                            if !name.is_empty() {
                                state.authors.push(name);
                            }
                        }
                    }
                    _ => {}
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::parse(
                    SOURCE_NAME,
                    format!("XML error at byte {}: {e}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(candidates)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE_ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>ArXiv Query</title>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2101.00001v1</id>
    <title>No PDF Here</title>
    <link href="http://arxiv.org/abs/2101.00001v1" rel="alternate" type="text/html"/>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_atom_feed_extracts_entries() {
        let candidates = parse_atom_feed(SAMPLE_ATOM).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.source_name, "arxiv");
        assert_eq!(first.title, "Attention Is All You Need");
        assert_eq!(first.download_url, "http://arxiv.org/pdf/1706.03762v7");
        assert_eq!(first.document_url, "http://arxiv.org/abs/1706.03762v7");
        assert!(first.open_access);
        assert_eq!(first.extra["arxiv_id"], "1706.03762v7");
        assert_eq!(
            first.extra["authors"],
            serde_json::json!(["Ashish Vaswani", "Noam Shazeer"])
        );
    }

    #[test]
    fn test_parse_atom_feed_entry_without_pdf_has_empty_download_url() {
        let candidates = parse_atom_feed(SAMPLE_ATOM).unwrap();
        assert!(!candidates[1].has_download_url());
    }

    #[test]
    fn test_parse_atom_feed_ignores_feed_level_title() {
        let candidates = parse_atom_feed(SAMPLE_ATOM).unwrap();
        assert!(candidates.iter().all(|c| c.title != "ArXiv Query"));
    }

    #[test]
    fn test_parse_atom_feed_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>empty</title></feed>"#;
        assert!(parse_atom_feed(xml).unwrap().is_empty());
    }

    #[test]
    fn test_parse_atom_feed_rejects_malformed_xml() {
        let result = parse_atom_feed("<feed><entry><title>x</entry></feed>");
        assert!(matches!(result, Err(SourceError::Parse { .. })));
    }
}
