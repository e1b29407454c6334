//! Multi-source retrieval orchestration and citation engine.
//!
//! Answers a question from up to three sources (local page index, web search,
//! cloud documents): the query is classified, sources are selected, retrieved
//! concurrently, filtered into a bounded context, handed to the generator and
//! the answer's `[n]` citations are checked against the evidence.

pub mod assembler;
pub mod citations;
pub mod classifier;
pub mod config;
pub mod orchestrator;
pub mod providers;
pub mod scorer;
pub mod selector;
pub mod sources;
pub mod synthesizer;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::{get_settings_path, load_settings, write_default_settings, RetrievalSettings};
pub use orchestrator::Orchestrator;
pub use types::{
    AnswerResult, Chunk, Citation, ContextBundle, Locator, Query, RetrievalDiagnostics,
    SourceKind, SourceUsage,
};

use agentrag_core::{AppConfig, AppError, AppResult};
use agentrag_llm::{create_client, LlmClient, ProviderType};
use agentrag_prompt::{load_prompt_or_builtin, ANSWER_PROMPT_ID};
use providers::page_index::{self, ImportStats, IndexStats};
use providers::{DuckDuckGoSearch, FallbackWebSearch, GoogleDriveDocs, SerpApiSearch, SqlitePageIndex};
use serde::Serialize;
use sources::{CloudRetriever, LocalRetriever, WebRetriever, WebSearch};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use synthesizer::AnswerSynthesizer;

/// Create the generator client for the configured provider.
pub fn create_generator(config: &AppConfig) -> AppResult<Arc<dyn LlmClient>> {
    let provider_config = config.get_provider_config(&config.provider);
    let endpoint = provider_config.as_ref().and_then(|pc| pc.endpoint());
    let timeout = provider_config
        .as_ref()
        .and_then(|pc| pc.timeout_secs())
        .map(Duration::from_secs);
    let api_key = config.resolve_api_key(&config.provider);

    create_client(&config.provider, endpoint, api_key.as_deref(), timeout)
        .map_err(AppError::Config)
}

/// Web search backed by SerpAPI when a key is set, DuckDuckGo otherwise or on failure.
pub fn web_search(config: &AppConfig) -> FallbackWebSearch {
    let primary = config
        .serpapi_key()
        .map(|key| Arc::new(SerpApiSearch::new(key)) as Arc<dyn WebSearch>);

    FallbackWebSearch::new(primary, Arc::new(DuckDuckGoSearch::new()))
}

/// Cloud retriever backed by Google Drive, or placeholders without a token.
pub fn cloud_retriever(config: &AppConfig) -> CloudRetriever {
    match config.drive_token() {
        Some(token) => CloudRetriever::new(Arc::new(GoogleDriveDocs::new(token))),
        None => CloudRetriever::placeholder(),
    }
}

/// Build an orchestrator wired to every configured source.
pub fn build_orchestrator(
    config: &AppConfig,
    settings: RetrievalSettings,
    client: Arc<dyn LlmClient>,
) -> AppResult<Orchestrator> {
    settings.validate()?;

    let prompt = load_prompt_or_builtin(&config.workspace, ANSWER_PROMPT_ID)?;
    let synthesizer = AnswerSynthesizer::with_prompt(
        client,
        config.model.clone(),
        prompt,
        settings.generation.clone(),
    );

    let index = SqlitePageIndex::new(config.index_path());
    if !index.exists() {
        tracing::info!(
            "No local page index at {:?}; run 'agentrag index import' to add documents",
            index.path()
        );
    }

    let orchestrator = Orchestrator::new(synthesizer, settings)
        .with_local(Arc::new(LocalRetriever::new(Arc::new(index))))
        .with_web(Arc::new(WebRetriever::new(Arc::new(web_search(config)))))
        .with_cloud(Arc::new(cloud_retriever(config)));

    tracing::debug!(sources = ?orchestrator.sources(), "Built orchestrator");
    Ok(orchestrator)
}

/// Import extracted pages from a JSONL file into the workspace page index.
pub fn import_pages(config: &AppConfig, jsonl: &Path, reset: bool) -> AppResult<ImportStats> {
    let file = std::fs::File::open(jsonl)
        .map_err(|e| AppError::Index(format!("Failed to open {:?}: {}", jsonl, e)))?;

    let mut conn = page_index::init_index(&config.index_path())?;
    if reset {
        page_index::reset_index(&conn)?;
    }

    page_index::import_jsonl(
        &mut conn,
        &providers::TrigramEmbedder::default(),
        std::io::BufReader::new(file),
    )
}

/// Page and document counts of the workspace page index, `None` when absent.
pub fn index_stats(config: &AppConfig) -> AppResult<Option<IndexStats>> {
    let path = config.index_path();
    if !path.exists() {
        return Ok(None);
    }

    let conn = page_index::open_read_only(&path)?;
    page_index::get_stats(&conn).map(Some)
}

/// Which collaborators a query would use with the current configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub generator: GeneratorHealth,
    pub web_search: WebSearchHealth,
    pub cloud_docs: CloudDocsHealth,
    pub local_index: LocalIndexHealth,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorHealth {
    pub provider: String,
    pub model: String,
    pub key_required: bool,
    pub key_present: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchHealth {
    pub backend: String,
    /// False when running on the free fallback only
    pub primary: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudDocsHealth {
    pub backend: String,
    pub placeholder: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalIndexHealth {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<IndexStats>,
}

impl HealthReport {
    /// True when answers can be generated at all.
    pub fn is_ready(&self) -> bool {
        !self.generator.key_required || self.generator.key_present
    }
}

/// Inspect configuration and workspace without contacting any service.
pub fn health(config: &AppConfig) -> AppResult<HealthReport> {
    let key_required = ProviderType::parse(&config.provider)
        .map(|p| p.requires_api_key())
        .unwrap_or(false);

    let web = web_search(config);
    let cloud = cloud_retriever(config);
    let index_path = config.index_path();

    Ok(HealthReport {
        generator: GeneratorHealth {
            provider: config.provider.clone(),
            model: config.model.clone(),
            key_required,
            key_present: config.resolve_api_key(&config.provider).is_some(),
        },
        web_search: WebSearchHealth {
            backend: web.active().to_string(),
            primary: web.has_primary(),
        },
        cloud_docs: CloudDocsHealth {
            backend: sources::SourceRetriever::backend(&cloud).to_string(),
            placeholder: cloud.is_placeholder(),
        },
        local_index: LocalIndexHealth {
            path: index_path.display().to_string(),
            exists: index_path.exists(),
            stats: index_stats(config)?,
        },
    })
}
