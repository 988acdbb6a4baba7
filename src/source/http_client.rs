//! Shared HTTP client construction for source adapters.

use std::time::Duration;

use reqwest::Client;

use super::SourceError;
use crate::user_agent;

/// Connect timeout for search requests.
pub const SEARCH_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout for a single search request.
pub const SEARCH_TIMEOUT_SECS: u64 = 30;

/// Builds the reqwest client an adapter uses for search traffic.
///
/// Search requests identify the tool honestly; browser User-Agents are
/// reserved for document downloads.
///
/// # Errors
///
/// Returns [`SourceError::Setup`] if the TLS backend cannot be initialized.
pub fn build_search_client(source_name: &str) -> Result<Client, SourceError> {
    Client::builder()
        .connect_timeout(Duration::from_secs(SEARCH_CONNECT_TIMEOUT_SECS))
        .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
        .gzip(true)
        .user_agent(user_agent::default_search_user_agent())
        .build()
        .map_err(|e| SourceError::setup(source_name, e.to_string()))
}
