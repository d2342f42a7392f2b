//! LLM provider implementations.

pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod scripted;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use scripted::{ScriptedBehavior, ScriptedClient};
