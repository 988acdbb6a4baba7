//! Bibliographic record model.
//!
//! A [`Record`] is one citation to resolve. It is built once by the input
//! parser (or a library caller) and shared read-only across searches and
//! downloads via `Arc<Record>`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of author surnames appended to a search query.
pub const MAX_QUERY_AUTHORS: usize = 3;

/// Errors raised when constructing a [`Record`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// The title was empty or whitespace-only.
    #[error("record title must not be empty")]
    EmptyTitle,
}

/// One bibliographic citation.
///
/// Fields are private so a record cannot change after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRecord")]
pub struct Record {
    title: String,
    authors: Vec<String>,
    year: Option<i32>,
    doi: Option<String>,
    journal: Option<String>,
}

/// Unvalidated record shape used for deserialization.
#[derive(Debug, Deserialize)]
struct RawRecord {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    journal: Option<String>,
}

impl TryFrom<RawRecord> for Record {
    type Error = RecordError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        Ok(Record::new(raw.title, raw.authors)?
            .with_year(raw.year)
            .with_doi(raw.doi)
            .with_journal(raw.journal))
    }
}

impl Record {
    /// Creates a record with a title and ordered author list.
    ///
    /// Blank author entries are dropped and surrounding whitespace is trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyTitle`] if the title is blank.
    pub fn new(title: impl Into<String>, authors: Vec<String>) -> Result<Self, RecordError> {
        let title = title.into().trim().to_string();
        if title.is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        let authors = authors
            .into_iter()
            .map(|author| author.trim().to_string())
            .filter(|author| !author.is_empty())
            .collect();
        Ok(Self {
            title,
            authors,
            year: None,
            doi: None,
            journal: None,
        })
    }

    /// Sets the publication year.
    #[must_use]
    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// Sets the DOI. Blank values are treated as absent.
    #[must_use]
    pub fn with_doi(mut self, doi: Option<String>) -> Self {
        self.doi = non_blank(doi);
        self
    }

    /// Sets the journal or venue. Blank values are treated as absent.
    #[must_use]
    pub fn with_journal(mut self, journal: Option<String>) -> Self {
        self.journal = non_blank(journal);
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn authors(&self) -> &[String] {
        &self.authors
    }

    #[must_use]
    pub fn year(&self) -> Option<i32> {
        self.year
    }

    #[must_use]
    pub fn doi(&self) -> Option<&str> {
        self.doi.as_deref()
    }

    #[must_use]
    pub fn journal(&self) -> Option<&str> {
        self.journal.as_deref()
    }

    /// Builds the query string sent to sources: the title followed by up to
    /// [`MAX_QUERY_AUTHORS`] author surnames.
    #[must_use]
    pub fn search_query(&self) -> String {
        let mut query = self.title.clone();
        for surname in self
            .authors
            .iter()
            .take(MAX_QUERY_AUTHORS)
            .filter_map(|author| surname(author))
        {
            query.push(' ');
            query.push_str(surname);
        }
        query
    }

    /// Short author label used in filenames and reports.
    ///
    /// - no authors: `Unknown`
    /// - one author: `A`
    /// - two authors: `A & B`
    /// - three or more: `A et al.`
    #[must_use]
    pub fn formatted_authors(&self) -> String {
        match self.authors.as_slice() {
            [] => "Unknown".to_string(),
            [only] => only.clone(),
            [first, second] => format!("{first} & {second}"),
            [first, ..] => format!("{first} et al."),
        }
    }
}

/// Extracts a surname: the part before a comma (`Smith, J.`), otherwise the
/// last whitespace-separated token (`John Smith`).
fn surname(author: &str) -> Option<&str> {
    let candidate = match author.split_once(',') {
        Some((family, _)) => family.trim(),
        None => author.split_whitespace().last().unwrap_or_default(),
    };
    (!candidate.is_empty()).then_some(candidate)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
