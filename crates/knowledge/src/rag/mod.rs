//! Retrieval-augmented answering.
//!
//! Lexical retrieval picks the evidence, source attribution decides what may
//! be cited, and the orchestrator turns both into an answer through the
//! provider chain.

pub mod orchestrator;
pub mod search;
pub mod sources;
pub mod types;

pub use orchestrator::{query_hash, ProviderOrchestrator, ProviderSlot, RULES_PROVIDER};
pub use search::{tokenize, LexicalRetriever, ScoredCandidate};
pub use sources::SourceSelector;
pub use types::{GroundingContext, GroundingEntry, OrchestratedResponse};
