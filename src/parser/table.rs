//! Column-based parsing for `.csv` record lists.

use std::path::Path;

use tracing::{debug, warn};

use super::citation::split_authors;
use super::error::ParseError;
use crate::record::Record;

/// Header positions of the recognised columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    title: usize,
    authors: Option<usize>,
    year: Option<usize>,
    doi: Option<usize>,
}

impl Columns {
    /// Matches header names by substring, case-insensitively. Without a
    /// `title` header the first column is the title.
    fn detect(headers: &csv::StringRecord) -> Option<Self> {
        if headers.is_empty() {
            return None;
        }
        let find = |needle: &str| {
            headers
                .iter()
                .position(|header| header.trim().to_lowercase().contains(needle))
        };
        Some(Self {
            title: find("title").unwrap_or(0),
            authors: find("author"),
            year: find("year"),
            doi: find("doi"),
        })
    }
}

/// Parses a CSV document with a header row.
///
/// Rows without a title are skipped. Author cells are split like citation
/// author lists, with `;` also accepted as a separator.
///
/// # Errors
///
/// Returns [`ParseError::Csv`] when the document is not well-formed CSV.
pub fn parse_csv_records(input: &str, path: &Path) -> Result<Vec<Record>, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());
    let headers = reader
        .headers()
        .map_err(|source| ParseError::csv(path, source))?
        .clone();
    let Some(columns) = Columns::detect(&headers) else {
        return Ok(Vec::new());
    };
    debug!(?columns, "detected CSV columns");

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = row.map_err(|source| ParseError::csv(path, source))?;
        let cell = |column: Option<usize>| {
            column
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let authors = cell(columns.authors)
            .map(|value| split_authors(&value.replace(';', ",")))
            .unwrap_or_default();
        let Ok(record) = Record::new(cell(Some(columns.title)).unwrap_or_default(), authors) else {
            // Header is line 1.
            warn!(line = index + 2, "skipping CSV row without a title");
            continue;
        };
        let year = cell(columns.year).and_then(parse_year);
        let doi = cell(columns.doi).map(ToString::to_string);
        records.push(record.with_year(year).with_doi(doi));
    }
    Ok(records)
}

/// Accepts `2017` as well as spreadsheet exports such as `2017.0`.
fn parse_year(value: &str) -> Option<i32> {
    value
        .parse::<i32>()
        .ok()
        .or_else(|| value.strip_suffix(".0").and_then(|v| v.parse().ok()))
}
