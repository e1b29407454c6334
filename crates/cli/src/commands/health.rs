//! Health command handler.

use agentrag_core::{config::AppConfig, AppError, AppResult};
use clap::Args;

/// Show which sources and generator are configured
#[derive(Args, Debug)]
pub struct HealthCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl HealthCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let report = agentrag_retrieval::health(config)?;

        if self.json {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        let g = &report.generator;
        let key = match (g.key_required, g.key_present) {
            (false, _) => "no key needed",
            (true, true) => "key present",
            (true, false) => "key MISSING",
        };
        println!("Generator:   {} / {} ({})", g.provider, g.model, key);

        let web = &report.web_search;
        println!(
            "Web search:  {}{}",
            web.backend,
            if web.primary { "" } else { " (free fallback)" }
        );

        let cloud = &report.cloud_docs;
        println!(
            "Cloud docs:  {}{}",
            cloud.backend,
            if cloud.placeholder { " (no token configured)" } else { "" }
        );

        let local = &report.local_index;
        match &local.stats {
            Some(stats) => println!(
                "Local index: {} ({} documents, {} pages)",
                local.path, stats.documents, stats.pages
            ),
            None => println!("Local index: {} (missing)", local.path),
        }

        println!("Status:      {}", if report.is_ready() { "ready" } else { "not ready" });

        Ok(())
    }
}
