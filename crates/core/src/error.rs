//! Error types for the Concierge workspace.
//!
//! This module defines a unified error enum that covers configuration, I/O,
//! storage, provider, knowledge and input-validation failures.

use thiserror::Error;

/// Unified error type for the Concierge workspace.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite storage errors
    #[error("Database error: {0}")]
    Database(String),

    /// LLM provider errors (transport, HTTP status, decoding)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Provider refused because its quota window has no headroom
    #[error("Quota exceeded for provider '{provider}'")]
    QuotaExceeded { provider: String },

    /// Provider did not answer within its time budget
    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// Knowledge store and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Query rejected before retrieval (empty, too long)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// No knowledge entry was relevant to the query
    #[error("No grounding found for query")]
    NoGroundingFound,

    /// Re-scrape requested while the URL is still inside its cooldown
    #[error("Source '{url}' was scraped recently; retry after {retry_after_secs}s")]
    ReconciliationConflict { url: String, retry_after_secs: u64 },

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
    /// Whether the orchestrator should move on to the next provider.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            AppError::QuotaExceeded { .. } | AppError::ProviderTimeout { .. } | AppError::Llm(_)
        )
    }

    /// Text that is safe to show to a widget user.
    ///
    /// Internal details (provider names, SQL, paths) never leave the process.
    pub fn user_message(&self) -> String {
        match self {
            AppError::MalformedInput(reason) => format!("Sorry, I couldn't read that question: {}.", reason),
            AppError::ReconciliationConflict { retry_after_secs, .. } => format!(
                "This page was refreshed recently. Please try again in {} minutes.",
                retry_after_secs.div_ceil(60)
            ),
            AppError::NoGroundingFound => {
                "I couldn't find that in our airport information yet.".to_string()
            }
            _ => "Sorry, something went wrong on our side. Please try again shortly.".to_string(),
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

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
