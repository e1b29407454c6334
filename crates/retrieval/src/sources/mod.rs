//! Source retrievers and the collaborator interfaces they wrap.
//!
//! Each retriever turns one external collaborator into [`Chunk`]s of a single
//! [`SourceKind`]. Collaborator errors surface as
//! [`AppError::SourceUnavailable`](agentrag_core::AppError::SourceUnavailable).

mod cloud;
mod local;
mod web;

pub use cloud::CloudRetriever;
pub use local::LocalRetriever;
pub use web::WebRetriever;

use crate::types::{Chunk, SourceKind};
use agentrag_core::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A page returned by a similarity search over the local index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageHit {
    /// Document the page belongs to
    pub document: String,
    pub text: String,
    pub page: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// A web search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// A document fetched from the cloud store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudDocument {
    pub name: String,
    pub content: String,
    pub url: String,
}

/// Similarity search over embedded local documents.
#[async_trait]
pub trait LocalIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `k` pages most similar to `query`.
    async fn similarity_search(&self, query: &str, k: usize) -> AppResult<Vec<PageHit>>;
}

/// Live web search.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str, max_results: usize) -> AppResult<Vec<WebHit>>;
}

/// Authenticated cloud document store.
#[async_trait]
pub trait CloudDocs: Send + Sync {
    fn name(&self) -> &str;

    /// Search the store and fetch the content of each match.
    async fn search_and_retrieve(
        &self,
        query: &str,
        max_results: usize,
    ) -> AppResult<Vec<CloudDocument>>;
}

/// Uniform retrieval contract over every source kind.
#[async_trait]
pub trait SourceRetriever: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Name of the backing collaborator, for logs and health reports.
    fn backend(&self) -> &str;

    /// At most `limit` chunks, all tagged with [`SourceRetriever::kind`].
    async fn retrieve(&self, query: &str, limit: usize) -> AppResult<Vec<Chunk>>;
}
