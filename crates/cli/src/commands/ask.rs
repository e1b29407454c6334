//! Ask command handler.
//!
//! Runs one query through the orchestrator and prints the cited answer.

use agentrag_core::{config::AppConfig, AppError, AppResult};
use agentrag_retrieval::{
    build_orchestrator, create_generator, load_settings, AnswerResult, Query, SourceKind,
};
use clap::Args;
use std::path::PathBuf;

/// Answer a question with citations
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// The question came from speech transcription; echo it in the result
    #[arg(long)]
    pub transcribed: bool,

    /// Show retrieval diagnostics after the answer
    #[arg(long)]
    pub explain: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let question = self.get_question()?;
        config.validate()?;

        let settings = load_settings(&config.workspace)?;
        let client = create_generator(config)?;
        let orchestrator = build_orchestrator(config, settings, client)?;

        let query = if self.transcribed {
            Query::transcribed(question)
        } else {
            Query::new(question)
        };

        let result = orchestrator.answer_query(query).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            self.print_answer(&result);
        }

        Ok(())
    }

    fn print_answer(&self, result: &AnswerResult) {
        if let Some(transcription) = &result.transcription {
            println!("Transcription: {}\n", transcription);
        }

        println!("{}", result.response);

        if !result.citations.is_empty() {
            println!("\nSources:");
            for citation in &result.citations {
                let label = match &citation.name {
                    Some(name) => format!("{} - {}", name, citation.locator.describe()),
                    None => citation.locator.describe(),
                };
                println!(
                    "  [{}] {} ({}, relevance {:.2})",
                    citation.index, label, citation.source_kind, citation.relevance
                );
            }
        }

        if self.explain {
            if let Some(d) = &result.diagnostics {
                println!("\nRetrieval:");
                println!("  scope: {}", d.scope);
                println!("  local preview score: {:.2}", d.local_preview_score);
                println!("  selection rule: {}", d.selection_rule);
                for kind in &d.queried {
                    if d.failed.contains(kind) {
                        println!("  {}: failed", kind);
                        continue;
                    }
                    let note = if *kind == SourceKind::Local && d.local_supplemental {
                        " (supplemental)"
                    } else {
                        ""
                    };
                    println!(
                        "  {}: {} candidates, {} in context{}",
                        kind,
                        d.candidates.get(*kind),
                        d.accepted.get(*kind),
                        note
                    );
                }
                if !d.orphaned_markers.is_empty() {
                    println!("  uncited markers: {:?}", d.orphaned_markers);
                }
            }
        }
    }

    /// Get the question text from the argument or a file.
    fn get_question(&self) -> AppResult<String> {
        let question = match (&self.question, &self.file) {
            (Some(question), _) => question.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::Config(format!("Failed to read question file {:?}: {}", path, e))
            })?,
            (None, None) => return Err(AppError::Config("No question provided".to_string())),
        };

        if question.trim().is_empty() {
            return Err(AppError::Config("Question is empty".to_string()));
        }

        Ok(question.trim().to_string())
    }
}
