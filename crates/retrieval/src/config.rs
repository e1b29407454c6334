//! Retrieval settings management.

use crate::scorer::RelevanceThresholds;
use agentrag_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tunables for one orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Minimum relevance per source kind
    pub thresholds: RelevanceThresholds,

    /// Maximum number of chunks handed to the generator
    pub context_budget: usize,

    /// Maximum chunks requested from each source
    pub limits: SourceLimits,

    /// Number of local hits used to estimate local relevance before selection
    pub preview_sample: usize,

    /// Per-retriever deadline in milliseconds
    pub retriever_timeout_ms: u64,

    /// Generator retry policy
    pub generation: GenerationSettings,

    /// Maximum characters of a citation snippet
    pub snippet_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            thresholds: RelevanceThresholds::default(),
            context_budget: 8,
            limits: SourceLimits::default(),
            preview_sample: 3,
            retriever_timeout_ms: 5000,
            generation: GenerationSettings::default(),
            snippet_chars: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLimits {
    pub local: usize,
    pub web: usize,
    pub cloud: usize,
}

impl Default for SourceLimits {
    fn default() -> Self {
        Self {
            local: 5,
            web: 5,
            cloud: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationSettings {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay before the first retry; doubles on each further retry
    pub initial_backoff_ms: u64,

    /// Model passed to the generator; the orchestrator's client default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub temperature: f32,

    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            model: None,
            temperature: 0.3,
            max_tokens: 1000,
        }
    }
}

impl GenerationSettings {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

impl RetrievalSettings {
    pub fn retriever_timeout(&self) -> Duration {
        Duration::from_millis(self.retriever_timeout_ms)
    }

    /// Reject settings the orchestrator cannot work with.
    pub fn validate(&self) -> AppResult<()> {
        let t = &self.thresholds;
        for (name, value) in [("local", t.local), ("cloud", t.cloud), ("web", t.web)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Config(format!(
                    "Threshold for {} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if self.context_budget == 0 {
            return Err(AppError::Config(
                "contextBudget must be at least 1".to_string(),
            ));
        }

        if self.generation.max_attempts == 0 {
            return Err(AppError::Config(
                "generation.maxAttempts must be at least 1".to_string(),
            ));
        }

        if self.retriever_timeout_ms == 0 {
            return Err(AppError::Config(
                "retrieverTimeoutMs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Load retrieval settings.
///
/// Loads from `.agentrag/retrieval.yaml` if it exists, otherwise the defaults.
pub fn load_settings(workspace: &Path) -> AppResult<RetrievalSettings> {
    let settings_path = get_settings_path(workspace);

    let settings = if settings_path.exists() {
        let content = fs::read_to_string(&settings_path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read retrieval settings at {:?}: {}",
                settings_path, e
            ))
        })?;

        let settings: RetrievalSettings = serde_yaml::from_str(&content).map_err(|e| {
            AppError::Config(format!(
                "Failed to parse retrieval settings at {:?}: {}",
                settings_path, e
            ))
        })?;

        tracing::debug!("Loaded retrieval settings from {:?}", settings_path);
        settings
    } else {
        tracing::debug!("Using default retrieval settings (no settings file found)");
        RetrievalSettings::default()
    };

    settings.validate()?;
    Ok(settings)
}

/// Save retrieval settings.
pub fn save_settings(workspace: &Path, settings: &RetrievalSettings) -> AppResult<()> {
    let settings_path = get_settings_path(workspace);

    if let Some(parent) = settings_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Config(format!("Failed to create settings directory: {}", e))
        })?;
    }

    let yaml = serde_yaml::to_string(settings)?;

    fs::write(&settings_path, yaml).map_err(|e| {
        AppError::Config(format!(
            "Failed to write retrieval settings to {:?}: {}",
            settings_path, e
        ))
    })?;

    tracing::debug!("Saved retrieval settings to {:?}", settings_path);
    Ok(())
}

/// Write the default settings file so it can be edited.
///
/// An existing file is kept unless `force` is set. Returns whether the file was written.
pub fn write_default_settings(workspace: &Path, force: bool) -> AppResult<bool> {
    if get_settings_path(workspace).exists() && !force {
        return Ok(false);
    }

    save_settings(workspace, &RetrievalSettings::default())?;
    Ok(true)
}

/// Get the path to the retrieval settings file.
pub fn get_settings_path(workspace: &Path) -> PathBuf {
    workspace.join(".agentrag").join("retrieval.yaml")
}
