//! Airport knowledge base and chat engine.
//!
//! Provides the SQLite knowledge store, lexical retrieval with source
//! attribution, provider orchestration with rule-based fallback, scrape
//! reconciliation and the chat engine that ties them together.

pub mod chat;
pub mod quota_store;
pub mod rag;
pub mod reconcile;
pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chat::{ChatEngine, ChatResponse};
pub use quota_store::SqliteCounterStore;
pub use rag::{
    GroundingContext, LexicalRetriever, OrchestratedResponse, ProviderOrchestrator, ProviderSlot,
    SourceSelector,
};
pub use reconcile::ScrapeReconciler;
pub use store::KnowledgeStore;
pub use types::{
    DataSource, EntryFilter, EntryUpdate, KnowledgeEntry, MessageRecord, NewEntry,
    ReconcileStats, ScrapedEntry, ScrapedPage, ScrapedSource,
};
