//! Record-list parsing.
//!
//! Three formats are supported, selected by file extension:
//!
//! - `.json`: an array of record objects (`title` required; `authors`,
//!   `year`, `doi`, `journal` optional)
//! - `.txt`: one citation per line, see [`parse_citation_line`]
//! - `.csv`: a header row naming title/author/year/doi columns, see
//!   [`parse_csv_records`]
//!
//! # Example
//!
//! ```
//! use paperfetch_core::parser::parse_text_records;
//!
//! let records = parse_text_records("# list\nHe et al. (2016). Deep Residual Learning.\n");
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].title(), "Deep Residual Learning");
//! ```

mod citation;
mod error;
mod table;

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::record::Record;

pub use citation::{parse_citation_line, split_authors};
pub use error::ParseError;
pub use table::parse_csv_records;

/// Parses every citation line in `input`, skipping blanks and comments.
#[must_use]
pub fn parse_text_records(input: &str) -> Vec<Record> {
    let mut skipped = 0usize;
    let records: Vec<Record> = input
        .lines()
        .filter_map(|line| {
            let parsed = parse_citation_line(line);
            if parsed.is_none() && !line.trim().is_empty() && !line.trim_start().starts_with('#') {
                skipped += 1;
            }
            parsed
        })
        .collect();
    debug!(records = records.len(), skipped, "parsed text record list");
    records
}

/// Parses a JSON array of records.
///
/// # Errors
///
/// Returns [`ParseError::Json`] when the document is not an array of valid
/// record objects.
pub fn parse_json_records(input: &str, path: &Path) -> Result<Vec<Record>, ParseError> {
    serde_json::from_str(input).map_err(|source| ParseError::json(path, source))
}

/// Reads and parses a record list, choosing the format by extension.
///
/// # Errors
///
/// Returns [`ParseError`] if the file cannot be read, has an unsupported
/// extension, or (for JSON and CSV) is malformed.
#[instrument(fields(path = %path.display()))]
pub async fn parse_records_file(path: &Path) -> Result<Vec<Record>, ParseError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !matches!(extension.as_str(), "txt" | "csv" | "json") {
        return Err(ParseError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ParseError::io(path, source))?;
    let records = match extension.as_str() {
        "json" => parse_json_records(&contents, path)?,
        "csv" => parse_csv_records(&contents, path)?,
        _ => parse_text_records(&contents),
    };
    info!(records = records.len(), "loaded record list");
    Ok(records)
}
