//! Index command handler.
//!
//! Manages the local page index searched for local documents.

use agentrag_core::{config::AppConfig, AppError, AppResult};
use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Manage the local page index
#[derive(Args, Debug)]
pub struct IndexCommand {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Import extracted pages from a JSONL file
    Import(IndexImportCommand),
    /// Show index statistics
    Stats(IndexStatsCommand),
}

impl IndexCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            IndexAction::Import(cmd) => cmd.execute(config),
            IndexAction::Stats(cmd) => cmd.execute(config),
        }
    }
}

/// Import extracted pages
#[derive(Args, Debug)]
pub struct IndexImportCommand {
    /// JSONL file with one {"document", "page", "text", "image_path"} object per line
    pub pages: PathBuf,

    /// Clear the index before importing
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexImportCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Importing pages from {:?}", self.pages);

        let stats = agentrag_retrieval::import_pages(config, &self.pages, self.reset)?;

        if self.json {
            let output = serde_json::json!({
                "index": config.index_path(),
                "imported": stats.imported,
                "skipped": stats.skipped,
            });
            print_json(&output)?;
        } else {
            println!(
                "Imported {} pages into {} ({} skipped)",
                stats.imported,
                config.index_path().display(),
                stats.skipped
            );
        }

        Ok(())
    }
}

/// Show index statistics
#[derive(Args, Debug)]
pub struct IndexStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexStatsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let stats = agentrag_retrieval::index_stats(config)?;

        if self.json {
            let output = serde_json::json!({
                "index": config.index_path(),
                "exists": stats.is_some(),
                "documents": stats.map(|s| s.documents).unwrap_or(0),
                "pages": stats.map(|s| s.pages).unwrap_or(0),
            });
            return print_json(&output);
        }

        match stats {
            Some(stats) => println!(
                "Index {}: {} documents, {} pages",
                config.index_path().display(),
                stats.documents,
                stats.pages
            ),
            None => println!(
                "No index at {}. Run 'agentrag index import <pages.jsonl>' first.",
                config.index_path().display()
            ),
        }

        Ok(())
    }
}

fn print_json(value: &serde_json::Value) -> AppResult<()> {
    let json =
        serde_json::to_string_pretty(value).map_err(|e| AppError::Serialization(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
