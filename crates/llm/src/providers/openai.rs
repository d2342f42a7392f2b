//! OpenAI-compatible chat completions provider.
//!
//! Works with any backend exposing `POST {base}/chat/completions` with bearer
//! authentication (OpenAI, Groq, OpenRouter, vLLM).

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use concierge_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<LlmUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// OpenAI-compatible client.
pub struct OpenAiClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(DEFAULT_ENDPOINT, api_key)
    }

    pub fn with_base_url(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: "openai".to_string(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the provider id.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn to_chat_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        ChatRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    fn convert_response(&self, request: &LlmRequest, response: ChatResponse) -> AppResult<LlmResponse> {
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::Llm(format!("{} returned no choices", self.name)))?;

        let mut usage = response.usage.unwrap_or_default();
        if usage.total_tokens == 0 {
            usage.total_tokens = usage.prompt_tokens + usage.completion_tokens;
        }

        Ok(LlmResponse {
            content,
            model: response.model.unwrap_or_else(|| request.model.clone()),
            usage,
        })
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::debug!(provider = %self.name, model = %request.model, "Sending chat completion request");

        let body = self.to_chat_request(request);
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to {}: {}", self.name, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Llm(format!(
                "{} API error ({}): {}",
                self.name, status, error_text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to parse {} response: {}", self.name, e)))?;

        self.convert_response(request, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_has_system_then_user() {
        let client = OpenAiClient::with_base_url("https://api.groq.com/openai/v1/", "key").named("groq");
        assert_eq!(client.base_url, "https://api.groq.com/openai/v1");
        assert_eq!(client.provider_name(), "groq");

        let request = LlmRequest::new("Taxi?", "llama-3.1-8b-instant").with_system("Be brief");
        let chat = client.to_chat_request(&request);
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert_eq!(chat.messages[1].content.as_deref(), Some("Taxi?"));
    }

    #[test]
    fn test_response_conversion_fills_total() {
        let client = OpenAiClient::new("key");
        let request = LlmRequest::new("Taxi?", "gpt-4o-mini");
        let raw: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"Taxi bay 3."}}],
                "usage":{"prompt_tokens":20,"completion_tokens":4}}"#,
        )
        .unwrap();

        let response = client.convert_response(&request, raw).unwrap();
        assert_eq!(response.content, "Taxi bay 3.");
        assert_eq!(response.model, "gpt-4o-mini");
        assert_eq!(response.usage.total_tokens, 24);
    }

    #[test]
    fn test_no_choices_is_error() {
        let client = OpenAiClient::new("key");
        let request = LlmRequest::new("Taxi?", "gpt-4o-mini");
        let raw: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(client.convert_response(&request, raw).is_err());
    }
}
