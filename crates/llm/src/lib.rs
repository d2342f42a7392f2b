//! LLM integration crate for the airport concierge.
//!
//! This crate provides a provider-agnostic abstraction for calling Large
//! Language Models, plus the pieces the provider orchestrator needs around
//! those calls: quota tracking, intent detection and the deterministic
//! rule-based responder that backs every fallback chain.
//!
//! # Providers
//! - **Gemini**: Google generateContent API
//! - **OpenAI-compatible**: OpenAI, Groq and other chat-completions APIs
//! - **Ollama**: Local LLM runtime
//! - **Scripted**: Canned behaviors for offline runs and tests
//!
//! # Example
//! ```no_run
//! use concierge_llm::{LlmClient, LlmRequest, providers::OllamaClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OllamaClient::new();
//! let request = LlmRequest::new("Where is the taxi stand?", "llama3.2");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod clock;
pub mod factory;
pub mod intent;
pub mod providers;
pub mod quota;
pub mod rules;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use clock::{Clock, ManualClock, SystemClock};
pub use factory::create_client;
pub use intent::{detect_intent, extract_flight_number, Intent};
pub use providers::{GeminiClient, OllamaClient, OpenAiClient, ScriptedBehavior, ScriptedClient};
pub use quota::{CounterStore, MemoryCounterStore, QuotaLimits, QuotaState, QuotaStatus, QuotaTracker};
pub use rules::{GroundedAnswer, RuleBasedResponder, RuleResponse};
pub use types::{AttemptOutcome, ProviderAttempt};
