//! Primary web search with a free fallback.

use crate::sources::{WebHit, WebSearch};
use agentrag_core::AppResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Tries the primary search first and falls back on error.
///
/// With no primary configured every query goes straight to the fallback.
pub struct FallbackWebSearch {
    primary: Option<Arc<dyn WebSearch>>,
    fallback: Arc<dyn WebSearch>,
}

impl FallbackWebSearch {
    pub fn new(primary: Option<Arc<dyn WebSearch>>, fallback: Arc<dyn WebSearch>) -> Self {
        Self { primary, fallback }
    }

    /// Name of the search that answers first.
    pub fn active(&self) -> &str {
        match &self.primary {
            Some(primary) => primary.name(),
            None => self.fallback.name(),
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }
}

#[async_trait]
impl WebSearch for FallbackWebSearch {
    fn name(&self) -> &str {
        self.active()
    }

    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebHit>> {
        if let Some(primary) = &self.primary {
            match primary.search(query, max_results).await {
                Ok(hits) => return Ok(hits),
                Err(e) => tracing::warn!(
                    "{} search failed, falling back to {}: {}",
                    primary.name(),
                    self.fallback.name(),
                    e
                ),
            }
        }

        self.fallback.search(query, max_results).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrag_core::AppError;

    struct Named(&'static str, bool);

    #[async_trait]
    impl WebSearch for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn search(&self, _query: &str, _max: usize) -> AppResult<Vec<WebHit>> {
            if !self.1 {
                return Err(AppError::Other(format!("{} down", self.0)));
            }
            Ok(vec![WebHit {
                title: self.0.to_string(),
                snippet: String::new(),
                url: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn test_primary_answers_when_healthy() {
        let search = FallbackWebSearch::new(
            Some(Arc::new(Named("primary", true))),
            Arc::new(Named("fallback", true)),
        );
        let hits = search.search("q", 3).await.unwrap();
        assert_eq!(hits[0].title, "primary");
        assert_eq!(search.active(), "primary");
    }

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let search = FallbackWebSearch::new(
            Some(Arc::new(Named("primary", false))),
            Arc::new(Named("fallback", true)),
        );
        let hits = search.search("q", 3).await.unwrap();
        assert_eq!(hits[0].title, "fallback");
    }

    #[tokio::test]
    async fn test_no_primary_uses_fallback() {
        let search = FallbackWebSearch::new(None, Arc::new(Named("fallback", true)));
        assert!(!search.has_primary());
        assert_eq!(search.name(), "fallback");
        assert_eq!(search.search("q", 3).await.unwrap()[0].title, "fallback");
    }

    #[tokio::test]
    async fn test_both_failing_is_error() {
        let search = FallbackWebSearch::new(
            Some(Arc::new(Named("primary", false))),
            Arc::new(Named("fallback", false)),
        );
        assert!(search.search("q", 3).await.is_err());
    }
}
