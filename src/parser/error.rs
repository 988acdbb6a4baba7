//! Error types for record-list parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading a record list.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file could not be read.
    #[error("cannot read record list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A `.json` list was not an array of record objects.
    #[error("invalid JSON record list {path}: {source}\n  Suggestion: {suggestion}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
        suggestion: &'static str,
    },

    /// A `.csv` list was not well-formed.
    #[error("invalid CSV record list {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Only `.txt`, `.csv` and `.json` lists are understood.
    #[error("unsupported record list format '{extension}' for {path}\n  Suggestion: use a .txt, .csv or .json file")]
    UnsupportedFormat { path: PathBuf, extension: String },
}

impl ParseError {
    /// Creates an `Io` error for `path`.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            source,
        }
    }

    /// Creates a `Json` error with a hint about the expected shape.
    #[must_use]
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
            suggestion: "expected an array of objects, each with a non-empty \"title\"",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_message() {
        let err = ParseError::UnsupportedFormat {
            path: PathBuf::from("papers.xlsx"),
            extension: "xlsx".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("papers.xlsx"), "should contain path");
        assert!(msg.contains(".json"), "suggestion should name supported formats");
    }

    #[test]
    fn test_json_error_has_suggestion() {
        let source = serde_json::from_str::<Vec<u8>>("{").unwrap_err();
        let msg = ParseError::json("list.json", source).to_string();
        assert!(msg.contains("list.json"));
        assert!(msg.contains("\"title\""));
    }
}
