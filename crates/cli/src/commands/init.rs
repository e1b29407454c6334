//! Init command handler.

use agentrag_core::{config::AppConfig, AppResult};
use agentrag_retrieval::{get_settings_path, write_default_settings};
use clap::Args;

/// Write the default retrieval settings file
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Overwrite an existing settings file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let path = get_settings_path(&config.workspace);

        if write_default_settings(&config.workspace, self.force)? {
            println!("Wrote default retrieval settings to {}", path.display());
        } else {
            println!(
                "Retrieval settings already exist at {} (use --force to overwrite)",
                path.display()
            );
        }

        Ok(())
    }
}
