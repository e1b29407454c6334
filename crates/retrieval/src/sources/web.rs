use super::{SourceRetriever, WebSearch};
use crate::types::{Chunk, SourceKind};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Retrieves web search results.
#[derive(Clone)]
pub struct WebRetriever {
    search: Arc<dyn WebSearch>,
}

impl WebRetriever {
    pub fn new(search: Arc<dyn WebSearch>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl SourceRetriever for WebRetriever {
    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }

    fn backend(&self) -> &str {
        self.search.name()
    }

    #[instrument(skip(self, query), fields(source = "web", backend = %self.search.name()))]
    async fn retrieve(&self, query: &str, limit: usize) -> AppResult<Vec<Chunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .search
            .search(query, limit)
            .await
            .map_err(|e| AppError::source_unavailable("web", e.to_string()))?;

        Ok(hits
            .into_iter()
            .filter(|hit| !(hit.title.trim().is_empty() && hit.snippet.trim().is_empty()))
            .take(limit)
            .map(|hit| Chunk::web(hit.title, hit.snippet, hit.url))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::WebHit;

    struct Results(Vec<WebHit>);

    #[async_trait]
    impl WebSearch for Results {
        fn name(&self) -> &str {
            "results"
        }

        async fn search(&self, _query: &str, _max: usize) -> AppResult<Vec<WebHit>> {
            Ok(self.0.clone())
        }
    }

    fn hit(title: &str, snippet: &str) -> WebHit {
        WebHit {
            title: title.to_string(),
            snippet: snippet.to_string(),
            url: format!("https://example.com/{}", title),
        }
    }

    #[tokio::test]
    async fn test_skips_empty_results_and_limits() {
        let retriever = WebRetriever::new(Arc::new(Results(vec![
            hit("", ""),
            hit("a", "first"),
            hit("b", "second"),
            hit("c", "third"),
        ])));

        let chunks = retriever.retrieve("q", 2).await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].name.as_deref(), Some("a"));
        assert!(chunks.iter().all(|c| c.kind() == SourceKind::Web));
    }
}
