//! Command handlers for the Concierge CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod knowledge;
pub mod quota;
pub mod scrape;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use knowledge::KnowledgeCommand;
pub use quota::QuotaCommand;
pub use scrape::ScrapeCommand;

use concierge_core::{config::AppConfig, markup, AppResult};
use concierge_knowledge::{ChatResponse, KnowledgeStore};
use serde::Serialize;
use std::sync::Arc;

/// Open the workspace knowledge store.
pub(crate) fn open_store(config: &AppConfig) -> AppResult<Arc<KnowledgeStore>> {
    Ok(Arc::new(KnowledgeStore::open(&config.database_path())?))
}

/// Pretty-print a value as JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Human-readable rendering of a chat response.
pub(crate) fn print_response(response: &ChatResponse, plain: bool) {
    if plain {
        println!("{}", markup::to_plain_text(&response.content));
    } else {
        println!("{}", response.content);
    }

    if !response.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &response.sources {
            println!("- {}", source);
        }
    }
    if response.requires_human {
        println!();
        println!("(A member of staff may be needed for this request.)");
    }
}
