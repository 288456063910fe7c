//! Error types for askbot.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, LLM, knowledge, prompt, history,
//! and the upstream/cancellation conditions surfaced by the answer pipeline.
//!
//! Content-policy rejection is deliberately absent: a refused question is a
//! normal return value of the pipeline, not an error.

use thiserror::Error;

/// Unified error type for askbot.
///
/// All functions in the application return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// LLM provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Conversation history errors
    #[error("History error: {0}")]
    History(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generation or retrieval backend failed (transport, quota, timeout).
    #[error("Upstream failure during {stage}: {message}")]
    Upstream { stage: String, message: String },

    /// The caller cancelled the operation.
    #[error("Cancelled during {stage}")]
    Cancelled { stage: String },

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Build an upstream failure for the given pipeline stage.
    pub fn upstream(stage: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Upstream {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Build a cancellation error for the given pipeline stage.
    pub fn cancelled(stage: impl Into<String>) -> Self {
        AppError::Cancelled {
            stage: stage.into(),
        }
    }

    /// Whether this error came from a generation or retrieval backend.
    pub fn is_upstream(&self) -> bool {
        matches!(self, AppError::Upstream { .. })
    }

    /// Whether this error is a caller cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled { .. })
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
