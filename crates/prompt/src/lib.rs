//! Prompt system for the airport concierge.
//!
//! This crate provides structured prompt management with:
//! - YAML-based prompt definitions, embedded defaults with workspace overrides
//! - Handlebars template rendering for system and user messages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{embedded_prompt, list_prompts, load_prompt, GROUNDED_CHAT_PROMPT};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
