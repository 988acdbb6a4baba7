//! Named collection of source adapters.
//!
//! The [`SourceRegistry`] maps source names to adapters and turns a
//! user-supplied priority list into the ordered adapter list the search
//! orchestrator walks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{
    ArxivSource, DoajSource, SemanticScholarSource, SourceAdapter, SourceError, ZenodoSource,
};

/// Invalid priority lists. These violate the run configuration and abort it.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriorityError {
    /// No sources were requested.
    #[error("source priority list is empty")]
    Empty,

    /// A requested source is not registered.
    #[error("unknown source '{name}' (available: {available})")]
    Unknown { name: String, available: String },

    /// A source appears more than once.
    #[error("source '{name}' listed more than once")]
    Duplicate { name: String },
}

/// Registered source adapters, keyed by name.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn SourceAdapter>>,
    registration_order: Vec<String>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in adapter: arXiv, Zenodo,
    /// DOAJ and Semantic Scholar.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Setup`] if an adapter's HTTP client cannot be built.
    pub fn with_builtin_sources() -> Result<Self, SourceError> {
        let mut registry = Self::new();
        registry.register(Arc::new(ArxivSource::new()?));
        registry.register(Arc::new(ZenodoSource::new()?));
        registry.register(Arc::new(DoajSource::new()?));
        registry.register(Arc::new(SemanticScholarSource::new()?));
        Ok(registry)
    }

    /// Registers an adapter. A later registration with the same name replaces
    /// the earlier one.
    #[tracing::instrument(skip(self, source), fields(source_name = source.name()))]
    pub fn register(&mut self, source: Arc<dyn SourceAdapter>) {
        let name = source.name().to_string();
        debug!("registering source");
        if self.sources.insert(name.clone(), source).is_none() {
            self.registration_order.push(name);
        } else {
            warn!(source = %name, "replacing previously registered source");
        }
    }

    /// Looks up an adapter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn SourceAdapter>> {
        self.sources.get(name).cloned()
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.registration_order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolves a priority list of names to adapters, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`PriorityError`] for an empty list, an unknown name, or a
    /// duplicated name.
    pub fn resolve<S: AsRef<str>>(
        &self,
        priority: &[S],
    ) -> Result<Vec<Arc<dyn SourceAdapter>>, PriorityError> {
        if priority.is_empty() {
            return Err(PriorityError::Empty);
        }
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(priority.len());
        for name in priority {
            let name = name.as_ref();
            if !seen.insert(name) {
                return Err(PriorityError::Duplicate {
                    name: name.to_string(),
                });
            }
            let source = self.get(name).ok_or_else(|| PriorityError::Unknown {
                name: name.to_string(),
                available: self.registration_order.join(", "),
            })?;
            resolved.push(source);
        }
        Ok(resolved)
    }

    /// Probes every registered source concurrently.
    ///
    /// Returns `(name, available)` pairs in registration order.
    pub async fn probe_all(&self) -> Vec<(String, bool)> {
        let probes = self.registration_order.iter().filter_map(|name| {
            let source = self.sources.get(name)?.clone();
            let name = name.clone();
            Some(async move {
                let available = source.check_availability().await;
                (name, available)
            })
        });
        let results = join_all(probes).await;
        let up = results.iter().filter(|(_, available)| *available).count();
        info!(available = up, total = results.len(), "source availability probed");
        results
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.registration_order)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::source::CandidateDocument;

    struct StaticSource {
        name: &'static str,
        available: bool,
    }

    #[async_trait]
    impl SourceAdapter for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn try_search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> Result<Vec<CandidateDocument>, SourceError> {
            Ok(Vec::new())
        }

        async fn check_availability(&self) -> bool {
            self.available
        }
    }

    fn registry() -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(StaticSource {
            name: "alpha",
            available: true,
        }));
        registry.register(Arc::new(StaticSource {
            name: "beta",
            available: false,
        }));
        registry
    }

    #[test]
    fn test_builtin_sources_are_registered_in_order() {
        let registry = SourceRegistry::with_builtin_sources().unwrap();
        assert_eq!(registry.names(), ["arxiv", "zenodo", "doaj", "semantic_scholar"]);
    }

    #[test]
    fn test_resolve_preserves_priority_order() {
        let resolved = registry().resolve(&["beta", "alpha"]).unwrap();
        let names: Vec<&str> = resolved.iter().map(|s| s.name()).collect();
        assert_eq!(names, ["beta", "alpha"]);
        assert_eq!(
            format!("{resolved:?}"),
            r#"[SourceAdapter("beta"), SourceAdapter("alpha")]"#
        );
    }

    #[test]
    fn test_resolve_rejects_empty_list() {
        let empty: [&str; 0] = [];
        assert_eq!(registry().resolve(&empty).unwrap_err(), PriorityError::Empty);
    }

    #[test]
    fn test_resolve_rejects_unknown_source() {
        let err = registry().resolve(&["alpha", "scihub"]).unwrap_err();
        assert!(matches!(err, PriorityError::Unknown { ref name, .. } if name == "scihub"));
        assert!(err.to_string().contains("alpha, beta"));
    }

    #[test]
    fn test_resolve_rejects_duplicates() {
        let err = registry().resolve(&["alpha", "alpha"]).unwrap_err();
        assert_eq!(
            err,
            PriorityError::Duplicate {
                name: "alpha".to_string()
            }
        );
    }

    #[test]
    fn test_register_same_name_replaces() {
        let mut registry = registry();
        registry.register(Arc::new(StaticSource {
            name: "alpha",
            available: false,
        }));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), ["alpha".to_string(), "beta".to_string()]);
    }

    #[tokio::test]
    async fn test_probe_all_reports_each_source() {
        let results = registry().probe_all().await;
        assert_eq!(
            results,
            vec![("alpha".to_string(), true), ("beta".to_string(), false)]
        );
    }
}
