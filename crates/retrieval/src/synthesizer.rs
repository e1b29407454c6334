//! Answer synthesis: render the cited-answer prompt and call the generator.

use crate::config::GenerationSettings;
use crate::selector::SelectionRule;
use crate::types::ContextBundle;
use agentrag_core::{AppError, AppResult};
use agentrag_llm::{LlmClient, LlmRequest};
use agentrag_prompt::{build_prompt, builtin_prompt, PromptDefinition, ANSWER_PROMPT_ID};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Template data for the cited-answer prompt.
#[derive(Debug, Serialize)]
struct PromptData<'a> {
    question: &'a str,
    priority_note: &'static str,
    sources: Vec<PromptSource<'a>>,
}

#[derive(Debug, Serialize)]
struct PromptSource<'a> {
    index: usize,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    locator: String,
    text: &'a str,
}

/// Answer returned when no evidence survived assembly.
pub fn no_grounding_answer(question: &str) -> String {
    format!(
        "I could not find any relevant information about \"{}\" in the local documents, \
         cloud documents or web search results.",
        question.trim()
    )
}

/// Builds the generation prompt and invokes the generator with bounded retry.
pub struct AnswerSynthesizer {
    client: Arc<dyn LlmClient>,
    model: String,
    prompt: PromptDefinition,
    generation: GenerationSettings,
}

impl AnswerSynthesizer {
    /// Synthesizer using the built-in cited-answer prompt.
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        generation: GenerationSettings,
    ) -> AppResult<Self> {
        Ok(Self::with_prompt(
            client,
            model,
            builtin_prompt(ANSWER_PROMPT_ID)?,
            generation,
        ))
    }

    /// Synthesizer using a custom prompt definition.
    pub fn with_prompt(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        prompt: PromptDefinition,
        generation: GenerationSettings,
    ) -> Self {
        let model = generation.model.clone().unwrap_or_else(|| model.into());
        Self {
            client,
            model,
            prompt,
            generation,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Produce raw answer text for the bundle.
    ///
    /// An empty bundle yields [`no_grounding_answer`] without calling the
    /// generator. Generator failures are retried with exponential backoff and
    /// surface as [`AppError::Generation`] once every attempt failed.
    #[instrument(skip_all, fields(sources = bundle.len(), rule = %rule, model = %self.model))]
    pub async fn synthesize(
        &self,
        question: &str,
        bundle: &ContextBundle,
        rule: SelectionRule,
    ) -> AppResult<String> {
        if bundle.is_empty() {
            tracing::info!("No grounding found, skipping generation");
            return Ok(no_grounding_answer(question));
        }

        let request = self.build_request(question, bundle, rule)?;
        self.complete_with_retries(&request).await
    }

    fn build_request(
        &self,
        question: &str,
        bundle: &ContextBundle,
        rule: SelectionRule,
    ) -> AppResult<LlmRequest> {
        let data = PromptData {
            question,
            priority_note: rule.priority_hint(),
            sources: bundle
                .entries()
                .iter()
                .map(|entry| PromptSource {
                    index: entry.index,
                    kind: entry.chunk.kind().prompt_label(),
                    name: entry.chunk.name.as_deref(),
                    locator: entry.chunk.locator.describe(),
                    text: entry.chunk.text.as_str(),
                })
                .collect(),
        };

        let built = build_prompt(&self.prompt, &data)?;
        tracing::debug!(chars = built.metadata.rendered_chars, "Rendered answer prompt");

        let mut request = LlmRequest::new(built.user, &self.model)
            .with_temperature(self.generation.temperature)
            .with_max_tokens(self.generation.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }

        Ok(request)
    }

    async fn complete_with_retries(&self, request: &LlmRequest) -> AppResult<String> {
        let attempts = self.generation.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.client.complete(request).await {
                Ok(response) if !response.content.trim().is_empty() => {
                    tracing::debug!(
                        attempt,
                        tokens = response.usage.total_tokens,
                        "Generator answered"
                    );
                    return Ok(response.content);
                }
                Ok(_) => last_error = Some("generator returned an empty answer".to_string()),
                Err(e) => last_error = Some(e.to_string()),
            }

            if attempt < attempts {
                let backoff = self.generation.backoff(attempt);
                warn!(
                    "Generation failed (attempt {}/{}), retrying in {}ms",
                    attempt,
                    attempts,
                    backoff.as_millis()
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(AppError::Generation(format!(
            "{} failed after {} attempts: {}",
            self.client.provider_name(),
            attempts,
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}
