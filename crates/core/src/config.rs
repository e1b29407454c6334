//! Configuration management for agentrag.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Defaults
//! - Config file (`.agentrag/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric, with local state stored in `.agentrag/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default environment variable holding the Gemini API key.
pub const DEFAULT_GEMINI_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Default environment variable holding the SerpAPI key.
pub const DEFAULT_SERPAPI_KEY_ENV: &str = "SERPAPI_API_KEY";

/// Default environment variable holding a Google Drive access token.
pub const DEFAULT_DRIVE_TOKEN_ENV: &str = "GOOGLE_DRIVE_ACCESS_TOKEN";

/// Providers the generator factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["ollama", "gemini"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .agentrag/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Generation provider ("ollama" or "gemini")
    pub provider: String,

    /// Generation model identifier
    pub model: String,

    /// Explicit API key for the generation provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// LLM provider configurations
    pub llm: Option<LlmConfig>,

    /// Retrieval source collaborators
    pub sources: SourcesConfig,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            ProviderConfig::Gemini { model, .. } | ProviderConfig::Ollama { model, .. } => model,
        }
    }

    /// Custom endpoint, if one is configured.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            ProviderConfig::Gemini { endpoint, .. } => endpoint.as_deref(),
            ProviderConfig::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }

    /// Request timeout in seconds, if one is configured.
    pub fn timeout_secs(&self) -> Option<u64> {
        match self {
            ProviderConfig::Ollama { timeout, .. } => *timeout,
            ProviderConfig::Gemini { .. } => None,
        }
    }
}

/// Settings for the retrieval collaborators (local index, web search, cloud docs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Local page index location, relative to the workspace unless absolute
    #[serde(rename = "indexPath", default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,

    /// Environment variable holding the SerpAPI key (primary web search)
    #[serde(rename = "serpApiKeyEnv", default = "default_serpapi_key_env")]
    pub serpapi_key_env: String,

    /// Environment variable holding the Google Drive access token
    #[serde(rename = "driveTokenEnv", default = "default_drive_token_env")]
    pub drive_token_env: String,
}

fn default_serpapi_key_env() -> String {
    DEFAULT_SERPAPI_KEY_ENV.to_string()
}

fn default_drive_token_env() -> String {
    DEFAULT_DRIVE_TOKEN_ENV.to_string()
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            index_path: None,
            serpapi_key_env: default_serpapi_key_env(),
            drive_token_env: default_drive_token_env(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    sources: Option<SourcesConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "ollama".to_string(), // Local-first default
            model: "llama3.2".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            sources: SourcesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML config file and environment variables.
    ///
    /// Environment variables:
    /// - `AGENTRAG_WORKSPACE`: Override workspace path
    /// - `AGENTRAG_CONFIG`: Path to config file
    /// - `AGENTRAG_PROVIDER`: Generation provider
    /// - `AGENTRAG_MODEL`: Model identifier
    /// - `AGENTRAG_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use agentrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("AGENTRAG_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("AGENTRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.agentrag_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(provider) = std::env::var("AGENTRAG_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("AGENTRAG_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("AGENTRAG_API_KEY").ok();

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into a copy of this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(sources) = config_file.sources {
            result.sources = sources;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and the config file.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .agentrag directory.
    pub fn agentrag_dir(&self) -> PathBuf {
        self.workspace.join(".agentrag")
    }

    /// Ensure the .agentrag directory exists.
    pub fn ensure_agentrag_dir(&self) -> AppResult<()> {
        let dir = self.agentrag_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .agentrag directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved location of the local page index.
    pub fn index_path(&self) -> PathBuf {
        match self.sources.index_path {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.workspace.join(path),
            None => self.agentrag_dir().join("index.sqlite"),
        }
    }

    /// Get the configuration for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<ProviderConfig> {
        self.llm
            .as_ref()
            .and_then(|llm| llm.providers.get(provider).cloned())
    }

    /// Resolve the API key for a provider.
    ///
    /// `AGENTRAG_API_KEY` wins; otherwise the provider's `apiKeyEnv` is read,
    /// falling back to `GOOGLE_API_KEY` for Gemini.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        let env_var = match self.get_provider_config(provider) {
            Some(ProviderConfig::Gemini { api_key_env, .. }) => Some(api_key_env),
            Some(ProviderConfig::Ollama { .. }) => None,
            None if provider.eq_ignore_ascii_case("gemini") => {
                Some(DEFAULT_GEMINI_KEY_ENV.to_string())
            }
            None => None,
        };

        env_var.and_then(|var| std::env::var(var).ok())
    }

    /// Resolve the SerpAPI key, if configured.
    pub fn serpapi_key(&self) -> Option<String> {
        std::env::var(&self.sources.serpapi_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Resolve the Google Drive access token, if configured.
    pub fn drive_token(&self) -> Option<String> {
        std::env::var(&self.sources.drive_token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.to_lowercase();

        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                self.provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "gemini" && self.resolve_api_key(&provider).is_none() {
            let env_var = match self.get_provider_config(&provider) {
                Some(ProviderConfig::Gemini { api_key_env, .. }) => api_key_env,
                _ => DEFAULT_GEMINI_KEY_ENV.to_string(),
            };
            return Err(AppError::Config(format!(
                "API key not found in environment variable: {}",
                env_var
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, "ollama");
        assert_eq!(config.model, "llama3.2");
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert_eq!(config.sources.serpapi_key_env, "SERPAPI_API_KEY");
    }

    #[test]
    fn test_agentrag_dir_and_index_path() {
        let mut config = AppConfig::default();
        config.workspace = PathBuf::from("/tmp/ws");
        assert!(config.agentrag_dir().ends_with(".agentrag"));
        assert_eq!(
            config.index_path(),
            PathBuf::from("/tmp/ws/.agentrag/index.sqlite")
        );

        config.sources.index_path = Some(PathBuf::from("data/pages.sqlite"));
        assert_eq!(config.index_path(), PathBuf::from("/tmp/ws/data/pages.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default();
        let overridden = config.with_overrides(
            None,
            None,
            Some("gemini".to_string()),
            Some("gemini-1.5-flash".to_string()),
            None,
            true,
            false,
        );

        assert_eq!(overridden.provider, "gemini");
        assert_eq!(overridden.model, "gemini-1.5-flash");
        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_sections() {
        let yaml = r#"
llm:
  activeProvider: gemini
  providers:
    gemini:
      apiKeyEnv: MY_GEMINI_KEY
      model: gemini-1.5-flash
    ollama:
      endpoint: http://localhost:11434
      model: llama3.2
      timeout: 60
sources:
  indexPath: pages.sqlite
  serpApiKeyEnv: MY_SERP_KEY
logging:
  level: debug
  color: false
"#;

        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.provider, "gemini");
        assert_eq!(merged.model, "gemini-1.5-flash");
        assert_eq!(merged.log_level.as_deref(), Some("debug"));
        assert!(merged.no_color);
        assert_eq!(merged.sources.serpapi_key_env, "MY_SERP_KEY");
        assert_eq!(merged.sources.drive_token_env, "GOOGLE_DRIVE_ACCESS_TOKEN");

        match merged.get_provider_config("ollama") {
            Some(ProviderConfig::Ollama { timeout, .. }) => assert_eq!(timeout, Some(60)),
            other => panic!("Expected ollama config, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_unknown_provider() {
        let mut config = AppConfig::default();
        config.provider = "unknown".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ollama() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = AppConfig::default();
        config.provider = "gemini".to_string();
        config.api_key = Some("explicit".to_string());
        assert_eq!(config.resolve_api_key("gemini").as_deref(), Some("explicit"));
        assert!(config.validate().is_ok());
    }
}
