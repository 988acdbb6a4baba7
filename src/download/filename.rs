//! Deterministic filenames for downloaded documents.
//!
//! The name is a pure function of the record and the source that supplied the
//! document, so a repeated run targets the same path and can skip it.

use crate::record::Record;

/// Maximum characters of the title kept in a filename.
pub const MAX_TITLE_CHARS: usize = 100;

/// Upper bound on the UTF-8 length of a generated stem, leaving room for
/// the extension and the partial-download suffix under common 255-byte limits.
const MAX_STEM_BYTES: usize = 200;

/// Builds `<authors>_<year>_<title>_<source>.pdf` for a record.
///
/// Components are sanitized for every common filesystem; empty components
/// are dropped.
#[must_use]
pub fn generate_filename(record: &Record, source_name: &str) -> String {
    format!("{}.pdf", filename_stem(record, source_name))
}

/// The filename without extension. Also names the metadata sidecar.
#[must_use]
pub fn filename_stem(record: &Record, source_name: &str) -> String {
    let authors = sanitize_filename_component(&record.formatted_authors().replace(',', ""));
    let year = record
        .year()
        .map_or_else(|| "undated".to_string(), |year| year.to_string());
    let title = title_component(record.title());
    let source = sanitize_filename_component(source_name);

    let prefix = [authors, year, title]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    if source.is_empty() {
        return truncate_to_bytes(&prefix, MAX_STEM_BYTES);
    }
    // The source suffix always survives truncation.
    let suffix = format!("_{source}");
    let prefix = truncate_to_bytes(&prefix, MAX_STEM_BYTES.saturating_sub(suffix.len()));
    if prefix.is_empty() {
        source
    } else {
        format!("{prefix}{suffix}")
    }
}

/// Keeps word characters and hyphens, turns whitespace runs into `_`, and
/// truncates to [`MAX_TITLE_CHARS`].
fn title_component(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_'))
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '&') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    out.trim_matches(|c| c == '_' || c == '.').to_string()
}

fn truncate_to_bytes(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].trim_end_matches('_').to_string()
}
