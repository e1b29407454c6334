//! Error types for agentrag.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! generation, retrieval source, local index, prompt and serialization
//! failures.

use thiserror::Error;

/// Unified error type for agentrag.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Errors are represented and propagated, never panicked on.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors (transport, HTTP status, decoding)
    #[error("LLM error: {0}")]
    Llm(String),

    /// A single retrieval source failed or timed out.
    ///
    /// Recovered by the orchestrator: the source contributes no evidence.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Answer generation failed after all retry attempts.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Local page index errors
    #[error("Index error: {0}")]
    Index(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build a `SourceUnavailable` error for the named source.
    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
