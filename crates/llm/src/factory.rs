//! LLM provider factory.
//!
//! Builds a concrete client for one configured provider slot. The rules slot
//! has no network client; the orchestrator handles it directly.

use crate::client::LlmClient;
use crate::providers::{GeminiClient, OllamaClient, OpenAiClient};
use concierge_core::config::{ProviderKind, ProviderSettings};
use concierge_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client for a provider slot.
///
/// # Errors
/// Returns `AppError::Config` if:
/// - A hosted provider has no API key
/// - The slot is the rules responder, which is not an LLM client
pub fn create_client(
    settings: &ProviderSettings,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    match settings.kind {
        ProviderKind::Ollama => {
            let base_url = settings
                .endpoint
                .as_deref()
                .unwrap_or("http://localhost:11434");
            Ok(Arc::new(
                OllamaClient::with_base_url(base_url).named(&settings.id),
            ))
        }
        ProviderKind::Gemini => {
            let key = require_key(settings, api_key)?;
            let client = match settings.endpoint.as_deref() {
                Some(endpoint) => GeminiClient::with_base_url(endpoint, key),
                None => GeminiClient::new(key),
            };
            Ok(Arc::new(client.named(&settings.id)))
        }
        ProviderKind::OpenAi => {
            let key = require_key(settings, api_key)?;
            let client = match settings.endpoint.as_deref() {
                Some(endpoint) => OpenAiClient::with_base_url(endpoint, key),
                None => OpenAiClient::new(key),
            };
            Ok(Arc::new(client.named(&settings.id)))
        }
        ProviderKind::Rules => Err(AppError::Config(format!(
            "Provider '{}' is the rule-based responder, not an LLM client",
            settings.id
        ))),
    }
}

fn require_key<'a>(settings: &ProviderSettings, api_key: Option<&'a str>) -> AppResult<&'a str> {
    api_key.filter(|k| !k.trim().is_empty()).ok_or_else(|| {
        AppError::Config(format!(
            "Provider '{}' requires an API key{}",
            settings.id,
            settings
                .api_key_env
                .as_deref()
                .map(|var| format!(" (set {})", var))
                .unwrap_or_default()
        ))
    })
}
