//! Single-line citation parsing for `.txt` record lists.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::record::Record;

/// `Authors. (Year). Rest` where `Rest` is `Title. Journal.`
#[allow(clippy::expect_used)]
static CITATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<authors>[^()]*?)\s*\((?P<year>\d{4})[a-z]?\)\.?\s*(?P<rest>.+)$")
        .expect("citation regex is valid") // Static pattern, safe to panic
});

/// `doi: 10.XXXX/suffix`, case-insensitive.
#[allow(clippy::expect_used)]
static DOI_PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdoi:\s*(10\.\d{4,9}(?:\.\d+)*/[^\s<>"']+)"#)
        .expect("DOI prefix regex is valid") // Static pattern, safe to panic
});

/// `et al.` in any capitalization, with or without the final period.
#[allow(clippy::expect_used)]
static ET_AL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bet\s+al\b\.?").expect("et al regex is valid") // Static pattern, safe to panic
});

/// Connectors between the last two authors: `&` or a standalone `and`.
#[allow(clippy::expect_used)]
static AUTHOR_CONNECTOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*&\s*|\s+and\s+").expect("author connector regex is valid") // Static pattern, safe to panic
});

/// Initials such as `A.`, `J.-P.` or `AB`.
#[allow(clippy::expect_used)]
static INITIALS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Z]\.?[\s-]*)+$").expect("initials regex is valid") // Static pattern, safe to panic
});

/// Parses one line into a record.
///
/// Returns `None` for blank lines, `#` comments, and lines without a usable
/// title. Lines that do not follow `Authors. (Year). Title. Journal.` are
/// taken as a bare title.
#[must_use]
pub fn parse_citation_line(line: &str) -> Option<Record> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let doi = DOI_PREFIX_PATTERN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';']).to_string());
    let without_doi = DOI_PREFIX_PATTERN.replace_all(line, "");
    let text = without_doi.trim().trim_end_matches([',', ';']).trim();

    let record = if let Some(caps) = CITATION_PATTERN.captures(text) {
        let authors = split_authors(&caps["authors"]);
        let year = caps["year"].parse::<i32>().ok();
        let (title, journal) = split_title_and_journal(&caps["rest"]);
        trace!(title = %title, ?journal, ?year, "structured citation");
        Record::new(title, authors)
            .ok()?
            .with_year(year)
            .with_journal(journal)
    } else {
        Record::new(text.trim_end_matches('.'), Vec::new()).ok()?
    };

    debug!(title = record.title(), "parsed citation");
    Some(record.with_doi(doi))
}

/// Splits an author list on `,`, `&`, `and` and `et al.`, keeping
/// `Surname, I.` pairs together.
#[must_use]
pub fn split_authors(authors: &str) -> Vec<String> {
    let without_et_al = ET_AL_PATTERN.replace_all(authors, "");
    let normalized = AUTHOR_CONNECTOR_PATTERN.replace_all(&without_et_al, ",");

    let mut result: Vec<String> = Vec::new();
    for part in normalized.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match result.last_mut() {
            Some(previous) if INITIALS_PATTERN.is_match(part) && !previous.contains(',') => {
                previous.push_str(", ");
                previous.push_str(part);
            }
            _ => result.push(part.trim_end_matches('.').to_string()),
        }
    }
    result
}

fn split_title_and_journal(rest: &str) -> (String, Option<String>) {
    let rest = rest.trim();
    match rest.split_once(". ") {
        Some((title, journal)) => {
            let journal = journal.trim().trim_end_matches('.').trim();
            (
                title.trim().to_string(),
                (!journal.is_empty()).then(|| journal.to_string()),
            )
        }
        None => (rest.trim_end_matches('.').trim().to_string(), None),
    }
}
