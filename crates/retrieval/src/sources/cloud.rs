use super::{CloudDocs, SourceRetriever};
use crate::types::{Chunk, SourceKind};
use agentrag_core::{AppError, AppResult};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// URL carried by placeholder cloud results.
pub const PLACEHOLDER_URL: &str = "https://docs.google.com/placeholder";

/// Retrieves cloud documents.
///
/// Without a configured store it answers with a single synthetic placeholder
/// instead of failing, so the rest of the pipeline behaves the same whether
/// or not cloud credentials exist.
#[derive(Clone)]
pub struct CloudRetriever {
    docs: Option<Arc<dyn CloudDocs>>,
}

impl CloudRetriever {
    pub fn new(docs: Arc<dyn CloudDocs>) -> Self {
        Self { docs: Some(docs) }
    }

    /// A retriever with no store behind it.
    pub fn placeholder() -> Self {
        Self { docs: None }
    }

    pub fn is_placeholder(&self) -> bool {
        self.docs.is_none()
    }

    fn placeholder_results(query: &str) -> Vec<Chunk> {
        vec![Chunk::cloud_placeholder(
            format!("Placeholder document about {}", query),
            format!(
                "Placeholder content related to {}. Cloud documents are not configured.",
                query
            ),
            PLACEHOLDER_URL,
        )]
    }
}

#[async_trait]
impl SourceRetriever for CloudRetriever {
    fn kind(&self) -> SourceKind {
        SourceKind::Cloud
    }

    fn backend(&self) -> &str {
        match &self.docs {
            Some(docs) => docs.name(),
            None => "placeholder",
        }
    }

    #[instrument(skip(self, query), fields(source = "cloud", backend = %self.backend()))]
    async fn retrieve(&self, query: &str, limit: usize) -> AppResult<Vec<Chunk>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(docs) = &self.docs else {
            tracing::debug!("Cloud documents not configured, returning placeholder");
            return Ok(Self::placeholder_results(query));
        };

        let documents = docs
            .search_and_retrieve(query, limit)
            .await
            .map_err(|e| AppError::source_unavailable("cloud", e.to_string()))?;

        Ok(documents
            .into_iter()
            .filter(|doc| !doc.content.trim().is_empty())
            .take(limit)
            .map(|doc| Chunk::cloud(doc.name, doc.content, doc.url))
            .collect())
    }
}
