//! User-Agent strings for search and download traffic.
//!
//! Search requests identify the tool. Document hosts frequently block
//! non-browser agents, so downloads rotate through a small pool of current
//! desktop browser strings instead.

use rand::seq::SliceRandom;

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/paperfetch/paperfetch";

/// Browser User-Agents used for document downloads.
pub const BROWSER_USER_AGENTS: [&str; 4] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Referer sent on the 403 retry, when the target's own origin was refused.
pub const GENERIC_REFERER: &str = "https://scholar.google.com/";

/// Default User-Agent for search requests (identifies the tool).
#[must_use]
pub(crate) fn default_search_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("paperfetch/{version} (academic-research-tool; +{PROJECT_UA_URL})")
}

/// Picks a browser User-Agent at random.
#[must_use]
pub fn rotated_browser_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// Picks a browser User-Agent different from `previous`.
#[must_use]
pub fn rotated_browser_user_agent_excluding(previous: &str) -> &'static str {
    let others: Vec<&'static str> = BROWSER_USER_AGENTS
        .iter()
        .copied()
        .filter(|ua| *ua != previous)
        .collect();
    others
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_else(rotated_browser_user_agent)
}
