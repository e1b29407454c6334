use super::{LocalIndex, SourceRetriever};
use crate::types::{Chunk, SourceKind};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Retrieves pages from the local document index.
#[derive(Clone)]
pub struct LocalRetriever {
    index: Arc<dyn LocalIndex>,
}

impl LocalRetriever {
    pub fn new(index: Arc<dyn LocalIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl SourceRetriever for LocalRetriever {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn backend(&self) -> &str {
        self.index.name()
    }

    #[instrument(skip(self, query), fields(source = "local", backend = %self.index.name()))]
    async fn retrieve(&self, query: &str, limit: usize) -> AppResult<Vec<Chunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let hits = self
            .index
            .similarity_search(query, limit)
            .await
            .map_err(|e| AppError::source_unavailable("local", e.to_string()))?;

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|hit| Chunk::local(hit.text, hit.page, hit.image_path).with_name(hit.document))
            .collect())
    }
}
