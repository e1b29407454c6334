//! Tests for query orchestration across sources.

use crate::classifier::QueryScope;
use crate::config::{GenerationSettings, RetrievalSettings};
use crate::orchestrator::Orchestrator;
use crate::selector::SelectionRule;
use crate::sources::SourceRetriever;
use crate::synthesizer::{no_grounding_answer, AnswerSynthesizer};
use crate::types::{Chunk, Query, SourceKind};
use agentrag_core::{AppError, AppResult};
use agentrag_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns a fixed set of chunks and records every requested limit.
struct StaticRetriever {
    kind: SourceKind,
    chunks: Vec<Chunk>,
    limits: Mutex<Vec<usize>>,
}

impl StaticRetriever {
    fn new(kind: SourceKind, chunks: Vec<Chunk>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            chunks,
            limits: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.limits.lock().unwrap().len()
    }

    fn limits(&self) -> Vec<usize> {
        self.limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceRetriever for StaticRetriever {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn backend(&self) -> &str {
        "static"
    }

    async fn retrieve(&self, _query: &str, limit: usize) -> AppResult<Vec<Chunk>> {
        self.limits.lock().unwrap().push(limit);
        Ok(self.chunks.iter().take(limit).cloned().collect())
    }
}

struct FailingRetriever(SourceKind);

#[async_trait]
impl SourceRetriever for FailingRetriever {
    fn kind(&self) -> SourceKind {
        self.0
    }

    fn backend(&self) -> &str {
        "failing"
    }

    async fn retrieve(&self, _query: &str, _limit: usize) -> AppResult<Vec<Chunk>> {
        Err(AppError::source_unavailable(self.0.as_str(), "connection refused"))
    }
}

/// Sleeps well past any test deadline before answering.
struct SlowRetriever(SourceKind);

#[async_trait]
impl SourceRetriever for SlowRetriever {
    fn kind(&self) -> SourceKind {
        self.0
    }

    fn backend(&self) -> &str {
        "slow"
    }

    async fn retrieve(&self, query: &str, _limit: usize) -> AppResult<Vec<Chunk>> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(vec![Chunk::web("late", query, "https://example.com/late")])
    }
}

/// Generator double that answers with a fixed text, or always fails.
struct ScriptedClient {
    answer: Option<String>,
    requests: Mutex<Vec<LlmRequest>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer.to_string()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.prompt.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.answer {
            Some(answer) => Ok(LlmResponse {
                content: answer.clone(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            }),
            None => Err(AppError::Llm("model overloaded".to_string())),
        }
    }
}

fn test_settings() -> RetrievalSettings {
    RetrievalSettings {
        retriever_timeout_ms: 50,
        generation: GenerationSettings {
            initial_backoff_ms: 1,
            ..GenerationSettings::default()
        },
        ..RetrievalSettings::default()
    }
}

fn orchestrator(client: Arc<ScriptedClient>, settings: RetrievalSettings) -> Orchestrator {
    let synthesizer =
        AnswerSynthesizer::new(client, "test-model", settings.generation.clone()).unwrap();
    Orchestrator::new(synthesizer, settings)
}

fn methodology_pages() -> Vec<Chunk> {
    vec![
        Chunk::local(
            "What methodology is described in section 3? The study relies on semi-structured interviews.",
            3,
            Some("pages/page_3.png".to_string()),
        ),
        Chunk::local("Appendix tables.", 12, None),
    ]
}

#[tokio::test]
async fn test_strong_document_match_answers_from_local_only() {
    let local = StaticRetriever::new(SourceKind::Local, methodology_pages());
    let web = StaticRetriever::new(
        SourceKind::Web,
        vec![Chunk::web("Methods", "methodology described", "https://example.com")],
    );
    let cloud = StaticRetriever::new(
        SourceKind::Cloud,
        vec![Chunk::cloud("Notes", "methodology section 3", "https://drive/x")],
    );
    let client = ScriptedClient::answering("The study relies on semi-structured interviews [1].");

    let result = orchestrator(client.clone(), test_settings())
        .with_local(local.clone())
        .with_web(web.clone())
        .with_cloud(cloud.clone())
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap();

    let diagnostics = result.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostics.scope, QueryScope::Document);
    assert!(diagnostics.local_preview_score >= 0.7);
    assert_eq!(diagnostics.selection_rule, SelectionRule::DocumentFirst);
    assert!(!diagnostics.local_supplemental);
    assert_eq!(diagnostics.queried, vec![SourceKind::Local]);

    // Preview plus the real retrieval; external sources are never touched
    assert_eq!(local.calls(), 2);
    assert_eq!(web.calls(), 0);
    assert_eq!(cloud.calls(), 0);

    // The appendix page scores below the local threshold
    assert_eq!(diagnostics.accepted.local, 1);
    assert_eq!(diagnostics.accepted.total(), 1);

    assert_eq!(result.citations.len(), 1);
    let citation = &result.citations[0];
    assert_eq!(citation.index, 1);
    assert_eq!(citation.source_kind, SourceKind::Local);
    assert_eq!(citation.locator.describe(), "page 3");
    assert_eq!(result.sources_used.local, 1);
    assert_eq!(result.sources_used.total(), 1);
    assert!(client.last_prompt().contains("[1] (local document; page 3)"));
}

#[tokio::test]
async fn test_external_question_prefers_web_and_cloud() {
    let local = StaticRetriever::new(
        SourceKind::Local,
        vec![Chunk::local("Interviews were coded twice.", 4, None)],
    );
    let web = StaticRetriever::new(
        SourceKind::Web,
        vec![Chunk::web(
            "Bitcoin price today",
            "What's the current Bitcoin price? It is trading near 60,000 USD.",
            "https://example.com/btc",
        )],
    );
    let cloud = StaticRetriever::new(
        SourceKind::Cloud,
        vec![Chunk::cloud("Crypto notes", "bitcoin holdings", "https://drive/crypto")],
    );
    let client = ScriptedClient::answering("Bitcoin trades near 60,000 USD [1], see also [2].");

    let result = orchestrator(client, test_settings())
        .with_local(local.clone())
        .with_web(web.clone())
        .with_cloud(cloud.clone())
        .answer_query("What's the current Bitcoin price?")
        .await
        .unwrap();

    let diagnostics = result.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostics.scope, QueryScope::External);
    assert_eq!(diagnostics.local_preview_score, 0.0);
    assert_eq!(diagnostics.selection_rule, SelectionRule::ExternalFirst);
    assert!(diagnostics.local_supplemental);
    assert_eq!(diagnostics.queried.len(), 3);
    assert_eq!(diagnostics.candidates.local, 1);
    assert_eq!(diagnostics.accepted.local, 0);

    // Web first, then cloud
    assert_eq!(result.citations[0].source_kind, SourceKind::Web);
    assert_eq!(result.citations[1].source_kind, SourceKind::Cloud);
    assert_eq!(result.sources_used.web, 1);
    assert_eq!(result.sources_used.cloud, 1);
    assert_eq!(result.sources_used.local, 0);
}

#[tokio::test]
async fn test_all_sources_failing_degrades_to_no_grounding() {
    let client = ScriptedClient::answering("unused [1]");
    let question = "What's the current Bitcoin price?";

    let result = orchestrator(client.clone(), test_settings())
        .with_local(Arc::new(FailingRetriever(SourceKind::Local)))
        .with_web(Arc::new(FailingRetriever(SourceKind::Web)))
        .with_cloud(Arc::new(FailingRetriever(SourceKind::Cloud)))
        .answer_query(question)
        .await
        .unwrap();

    assert_eq!(result.response, no_grounding_answer(question));
    assert!(result.citations.is_empty());
    assert_eq!(result.sources_used.total(), 0);
    assert_eq!(client.calls(), 0);

    let diagnostics = result.diagnostics.unwrap();
    assert!(diagnostics.all_sources_failed);
    assert_eq!(diagnostics.failed.len(), 3);
}

#[tokio::test]
async fn test_generation_failure_is_terminal() {
    let client = ScriptedClient::failing();

    let err = orchestrator(client.clone(), test_settings())
        .with_local(StaticRetriever::new(SourceKind::Local, methodology_pages()))
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Generation(_)));
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_slow_source_times_out_without_failing_query() {
    let cloud = StaticRetriever::new(
        SourceKind::Cloud,
        vec![Chunk::cloud(
            "Budget news",
            "The latest budget news was published in March.",
            "https://drive/budget",
        )],
    );
    let client = ScriptedClient::answering("It was published in March [1].");

    let result = orchestrator(client, test_settings())
        .with_local(StaticRetriever::new(
            SourceKind::Local,
            vec![Chunk::local("Interviews were coded twice.", 1, None)],
        ))
        .with_web(Arc::new(SlowRetriever(SourceKind::Web)))
        .with_cloud(cloud)
        .answer_query("latest news about the budget")
        .await
        .unwrap();

    let diagnostics = result.diagnostics.as_ref().unwrap();
    assert_eq!(diagnostics.failed, vec![SourceKind::Web]);
    assert!(!diagnostics.all_sources_failed);
    assert_eq!(result.citations.len(), 1);
    assert_eq!(result.citations[0].source_kind, SourceKind::Cloud);
}

#[tokio::test]
async fn test_failed_preview_counts_as_zero() {
    let web = StaticRetriever::new(
        SourceKind::Web,
        vec![Chunk::web("Section 3", "methodology described in section 3", "https://e.com")],
    );
    let client = ScriptedClient::answering("See [1].");

    let result = orchestrator(client, test_settings())
        .with_local(Arc::new(FailingRetriever(SourceKind::Local)))
        .with_web(web)
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap();

    let diagnostics = result.diagnostics.unwrap();
    assert_eq!(diagnostics.local_preview_score, 0.0);
    assert_eq!(diagnostics.selection_rule, SelectionRule::ExternalFirst);
    assert_eq!(diagnostics.failed, vec![SourceKind::Local]);
    assert!(!diagnostics.all_sources_failed);
}

#[tokio::test]
async fn test_context_budget_caps_prompt() {
    let pages = (1..=5)
        .map(|page| {
            Chunk::local(
                format!("What methodology is described in section 3? Part {}.", page),
                page,
                None,
            )
        })
        .collect();
    let client = ScriptedClient::answering("Interviews [1][2].");
    let settings = RetrievalSettings {
        context_budget: 2,
        ..test_settings()
    };

    let result = orchestrator(client.clone(), settings)
        .with_local(StaticRetriever::new(SourceKind::Local, pages))
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap();

    let diagnostics = result.diagnostics.unwrap();
    assert_eq!(diagnostics.candidates.local, 5);
    assert_eq!(diagnostics.accepted.local, 2);

    let prompt = client.last_prompt();
    assert!(prompt.contains("[2] (local document"));
    assert!(!prompt.contains("[3] ("));
}

#[tokio::test]
async fn test_per_source_limits_are_passed_through() {
    let local = StaticRetriever::new(SourceKind::Local, methodology_pages());
    let mut settings = test_settings();
    settings.limits.local = 4;
    settings.preview_sample = 2;

    orchestrator(ScriptedClient::answering("ok [1]"), settings)
        .with_local(local.clone())
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap();

    assert_eq!(local.limits(), vec![2, 4]);
}

#[tokio::test]
async fn test_orphaned_marker_is_reported_not_cited() {
    let raw = "Interviews [1], and a claim with no source [7].";
    let client = ScriptedClient::answering(raw);

    let result = orchestrator(client, test_settings())
        .with_local(StaticRetriever::new(SourceKind::Local, methodology_pages()))
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap();

    assert_eq!(result.response, raw);
    assert_eq!(result.citations.len(), 1);
    assert_eq!(result.diagnostics.unwrap().orphaned_markers, vec![7]);
}

#[tokio::test]
async fn test_transcribed_query_is_echoed() {
    let client = ScriptedClient::answering("Interviews [1].");
    let question = "What methodology is described in section 3?";

    let result = orchestrator(client, test_settings())
        .with_local(StaticRetriever::new(SourceKind::Local, methodology_pages()))
        .answer_query(Query::transcribed(question))
        .await
        .unwrap();

    assert_eq!(result.transcription.as_deref(), Some(question));
}

#[tokio::test]
async fn test_typed_query_has_no_transcription() {
    let result = orchestrator(ScriptedClient::answering("Interviews [1]."), test_settings())
        .with_local(StaticRetriever::new(SourceKind::Local, methodology_pages()))
        .answer_query("What methodology is described in section 3?")
        .await
        .unwrap();

    assert!(result.transcription.is_none());
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let client = ScriptedClient::answering("unused");
    let err = orchestrator(client.clone(), test_settings())
        .answer_query("   ")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Other(_)));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_no_configured_sources() {
    let client = ScriptedClient::answering("unused");
    let result = orchestrator(client.clone(), test_settings())
        .answer_query("latest news")
        .await
        .unwrap();

    let diagnostics = result.diagnostics.unwrap();
    assert!(diagnostics.queried.is_empty());
    assert!(!diagnostics.all_sources_failed);
    assert_eq!(result.response, no_grounding_answer("latest news"));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_queries_share_one_orchestrator() {
    let orchestrator = Arc::new(
        orchestrator(ScriptedClient::answering("Interviews [1]."), test_settings())
            .with_local(StaticRetriever::new(SourceKind::Local, methodology_pages())),
    );

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move {
            orchestrator
                .answer_query("What methodology is described in section 3?")
                .await
        }
    });
    let second = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.answer_query(Query::transcribed("section 3 methodology")).await }
    });

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    assert!(first.transcription.is_none());
    assert_eq!(second.transcription.as_deref(), Some("section 3 methodology"));
    assert_eq!(first.citations.len(), 1);
}

#[tokio::test]
async fn test_dropping_in_flight_query_abandons_it() {
    let client = ScriptedClient::answering("Published in March [1].");
    let settings = RetrievalSettings {
        retriever_timeout_ms: 60_000,
        ..test_settings()
    };
    let orchestrator = orchestrator(client.clone(), settings)
        .with_web(Arc::new(SlowRetriever(SourceKind::Web)))
        .with_cloud(StaticRetriever::new(
            SourceKind::Cloud,
            vec![Chunk::cloud(
                "Budget news",
                "The latest budget news was published in March.",
                "https://drive/budget",
            )],
        ));

    let started = std::time::Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        orchestrator.answer_query("latest news about the budget"),
    )
    .await;

    assert!(outcome.is_err());
    assert!(started.elapsed() < Duration::from_secs(2));
    // Generation never started for the abandoned run
    assert_eq!(client.calls(), 0);
}
