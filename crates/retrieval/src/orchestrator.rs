//! Per-query orchestration: classify, select, retrieve, assemble, generate, validate.

use crate::assembler::assemble;
use crate::citations::{orphaned_markers, validate};
use crate::classifier::classify;
use crate::config::RetrievalSettings;
use crate::scorer::score;
use crate::selector::select;
use crate::sources::SourceRetriever;
use crate::synthesizer::AnswerSynthesizer;
use crate::types::{AnswerResult, Chunk, Query, RetrievalDiagnostics, SourceKind, SourceUsage};
use agentrag_core::{AppError, AppResult};
use futures::future::OptionFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::instrument;

/// Owns the collaborators and settings for answering queries.
///
/// Runs share no mutable state, so one orchestrator can serve concurrent
/// queries. Dropping an in-flight [`Orchestrator::answer_query`] future
/// abandons its pending retrievals.
pub struct Orchestrator {
    local: Option<Arc<dyn SourceRetriever>>,
    web: Option<Arc<dyn SourceRetriever>>,
    cloud: Option<Arc<dyn SourceRetriever>>,
    synthesizer: AnswerSynthesizer,
    settings: RetrievalSettings,
}

impl Orchestrator {
    /// An orchestrator with no sources; add them with the `with_*` builders.
    pub fn new(synthesizer: AnswerSynthesizer, settings: RetrievalSettings) -> Self {
        Self {
            local: None,
            web: None,
            cloud: None,
            synthesizer,
            settings,
        }
    }

    pub fn with_local(mut self, retriever: Arc<dyn SourceRetriever>) -> Self {
        self.local = Some(retriever);
        self
    }

    pub fn with_web(mut self, retriever: Arc<dyn SourceRetriever>) -> Self {
        self.web = Some(retriever);
        self
    }

    pub fn with_cloud(mut self, retriever: Arc<dyn SourceRetriever>) -> Self {
        self.cloud = Some(retriever);
        self
    }

    /// Configured sources with the collaborator behind each.
    pub fn sources(&self) -> Vec<(SourceKind, &str)> {
        SourceKind::ALL
            .into_iter()
            .filter_map(|kind| self.retriever(kind).map(|r| (kind, r.backend())))
            .collect()
    }

    fn retriever(&self, kind: SourceKind) -> Option<&Arc<dyn SourceRetriever>> {
        match kind {
            SourceKind::Local => self.local.as_ref(),
            SourceKind::Web => self.web.as_ref(),
            SourceKind::Cloud => self.cloud.as_ref(),
        }
    }

    fn limit(&self, kind: SourceKind) -> usize {
        let limits = &self.settings.limits;
        match kind {
            SourceKind::Local => limits.local,
            SourceKind::Web => limits.web,
            SourceKind::Cloud => limits.cloud,
        }
    }

    /// Answer a question with cited evidence from the selected sources.
    ///
    /// Source failures and timeouts are recovered: the source contributes no
    /// evidence and is listed in the diagnostics. The only failures surfaced
    /// are an empty question and generation failing on every attempt.
    pub async fn answer_query(&self, query: impl Into<Query>) -> AppResult<AnswerResult> {
        let query = query.into();
        self.run(&query).await
    }

    #[instrument(skip_all, fields(transcribed = query.is_transcribed()))]
    async fn run(&self, query: &Query) -> AppResult<AnswerResult> {
        let text = query.text().trim();
        if text.is_empty() {
            return Err(AppError::Other("Query text is empty".to_string()));
        }

        let classification = classify(text);
        let local_preview_score = self.local_preview_score(text).await;
        let selection = select(local_preview_score, &classification);

        tracing::info!(
            scope = %classification.scope,
            local_preview_score,
            rule = %selection.rule,
            "Planned retrieval"
        );

        let queried: Vec<SourceKind> = SourceKind::ALL
            .into_iter()
            .filter(|kind| selection.uses(*kind) && self.retriever(*kind).is_some())
            .collect();

        let fetch = |kind: SourceKind| -> OptionFuture<_> {
            queried
                .contains(&kind)
                .then(|| self.retrieve_from(kind, text))
                .into()
        };

        let (local, web, cloud) = tokio::join!(
            fetch(SourceKind::Local),
            fetch(SourceKind::Web),
            fetch(SourceKind::Cloud)
        );

        let mut candidates = SourceUsage::default();
        let mut failed = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();

        for (kind, outcome) in [
            (SourceKind::Local, local),
            (SourceKind::Web, web),
            (SourceKind::Cloud, cloud),
        ] {
            match outcome {
                Some(Ok(found)) => {
                    tracing::info!(source = %kind, chunks = found.len(), "Retrieved candidates");
                    candidates.add(kind, found.len());
                    chunks.extend(found);
                }
                Some(Err(e)) => {
                    tracing::warn!(source = %kind, "Source contributed no evidence: {}", e);
                    failed.push(kind);
                }
                None => {}
            }
        }

        let all_sources_failed = !queried.is_empty() && failed.len() == queried.len();
        if all_sources_failed {
            tracing::warn!("All selected sources failed, answering without evidence");
        }

        let bundle = assemble(
            text,
            chunks,
            &selection.priority,
            &self.settings.thresholds,
            self.settings.context_budget,
        );

        let raw_answer = self
            .synthesizer
            .synthesize(text, &bundle, selection.rule)
            .await?;

        let mut result = validate(&raw_answer, &bundle, self.settings.snippet_chars);

        result.transcription = query.is_transcribed().then(|| query.text().to_string());
        result.diagnostics = Some(RetrievalDiagnostics {
            scope: classification.scope,
            local_preview_score,
            selection_rule: selection.rule,
            local_supplemental: selection.local_supplemental,
            queried,
            failed,
            all_sources_failed,
            candidates,
            accepted: bundle.counts(),
            orphaned_markers: orphaned_markers(&raw_answer, &bundle),
        });

        tracing::info!(
            citations = result.citations.len(),
            local = result.sources_used.local,
            web = result.sources_used.web,
            cloud = result.sources_used.cloud,
            "Answered query"
        );

        Ok(result)
    }

    /// Estimate how well the local index covers the question.
    ///
    /// Mean score of the preview hits that pass the local threshold; 0 when
    /// there is no local source, nothing relevant comes back or the preview fails.
    async fn local_preview_score(&self, text: &str) -> f32 {
        let Some(local) = &self.local else {
            return 0.0;
        };

        let sample = self.settings.preview_sample;
        let hits = match with_deadline(local.as_ref(), text, sample, self.deadline()).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("Local preview failed: {}", e);
                return 0.0;
            }
        };

        let threshold = self.settings.thresholds.local;
        let relevant: Vec<f32> = hits
            .iter()
            .map(|chunk| score(text, &chunk.scoring_text()))
            .filter(|s| *s >= threshold)
            .collect();

        if relevant.is_empty() {
            return 0.0;
        }

        relevant.iter().sum::<f32>() / relevant.len() as f32
    }

    async fn retrieve_from(&self, kind: SourceKind, text: &str) -> AppResult<Vec<Chunk>> {
        let retriever = self
            .retriever(kind)
            .ok_or_else(|| AppError::source_unavailable(kind.as_str(), "not configured"))?;

        with_deadline(retriever.as_ref(), text, self.limit(kind), self.deadline()).await
    }

    fn deadline(&self) -> Duration {
        self.settings.retriever_timeout()
    }
}

/// Run one retrieval under a deadline; an expired call is a source failure.
async fn with_deadline(
    retriever: &dyn SourceRetriever,
    text: &str,
    limit: usize,
    deadline: Duration,
) -> AppResult<Vec<Chunk>> {
    match timeout(deadline, retriever.retrieve(text, limit)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::source_unavailable(
            retriever.kind().as_str(),
            format!("timed out after {}ms", deadline.as_millis()),
        )),
    }
}
