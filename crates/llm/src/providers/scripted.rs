//! Scripted provider with canned behavior.
//!
//! Useful for offline demos and for exercising fallback chains in tests.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use concierge_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What a scripted client does when called.
#[derive(Debug, Clone)]
pub enum ScriptedBehavior {
    /// Answer immediately
    Reply(String),
    /// Answer after a delay
    Delayed { delay: Duration, reply: String },
    /// Fail with a provider error
    Fail(String),
    /// Answer with empty content
    Empty,
}

pub struct ScriptedClient {
    name: String,
    behavior: ScriptedBehavior,
    calls: AtomicUsize,
}

impl ScriptedClient {
    pub fn new(name: impl Into<String>, behavior: ScriptedBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(name: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::new(name, ScriptedBehavior::Reply(reply.into()))
    }

    pub fn failing(name: impl Into<String>) -> Self {
        Self::new(name, ScriptedBehavior::Fail("scripted failure".to_string()))
    }

    /// Number of times `complete` has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reply(&self, request: &LlmRequest, text: &str) -> LlmResponse {
        let prompt_tokens = request.prompt.split_whitespace().count() as u32;
        let completion_tokens = text.split_whitespace().count() as u32;
        LlmResponse {
            content: text.to_string(),
            model: request.model.clone(),
            usage: LlmUsage::new(prompt_tokens, completion_tokens),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedClient {
    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match &self.behavior {
            ScriptedBehavior::Reply(text) => Ok(self.reply(request, text)),
            ScriptedBehavior::Delayed { delay, reply } => {
                tokio::time::sleep(*delay).await;
                Ok(self.reply(request, reply))
            }
            ScriptedBehavior::Fail(message) => Err(AppError::Llm(format!(
                "{}: {}",
                self.name, message
            ))),
            ScriptedBehavior::Empty => Ok(self.reply(request, "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_counts_calls() {
        let client = ScriptedClient::replying("p1", "Gate 5 is on the left.");
        let request = LlmRequest::new("Where is gate 5?", "m");

        let response = client.complete(&request).await.unwrap();
        assert_eq!(response.content, "Gate 5 is on the left.");
        assert_eq!(response.usage.prompt_tokens, 4);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_failing_client() {
        let client = ScriptedClient::failing("p2");
        let err = client
            .complete(&LlmRequest::new("hi", "m"))
            .await
            .unwrap_err();
        assert!(err.is_fallback_trigger());
    }

    #[tokio::test]
    async fn test_delayed_calls_run_concurrently() {
        let client = ScriptedClient::new(
            "p3",
            ScriptedBehavior::Delayed {
                delay: Duration::from_millis(100),
                reply: "ok".to_string(),
            },
        );
        let request = LlmRequest::new("hi", "m");

        let started = std::time::Instant::now();
        let results = futures::future::join_all((0..5).map(|_| client.complete(&request))).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(client.calls(), 5);
        assert!(started.elapsed() < Duration::from_millis(450));
    }
}
