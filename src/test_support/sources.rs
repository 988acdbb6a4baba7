use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::source::{CandidateDocument, SourceAdapter, SourceError};

/// Adapter returning a fixed answer and counting how often it was asked.
pub struct ScriptedSource {
    name: String,
    answer: Result<Vec<CandidateDocument>, String>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn with_url(name: &str, download_url: &str) -> Arc<Self> {
        let candidate = CandidateDocument::new(name, "Scripted").with_download_url(download_url);
        Self::with_candidates(name, vec![candidate])
    }

    pub fn with_candidates(name: &str, candidates: Vec<CandidateDocument>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            answer: Ok(candidates),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty(name: &str) -> Arc<Self> {
        Self::with_candidates(name, Vec::new())
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            answer: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn try_search(
        &self,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<CandidateDocument>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.answer {
            Ok(candidates) => Ok(candidates.iter().take(limit).cloned().collect()),
            Err(message) => Err(SourceError::parse(&self.name, message.as_str())),
        }
    }

    async fn check_availability(&self) -> bool {
        self.answer.is_ok()
    }
}
