//! Chat message processing.
//!
//! Validates the message, retrieves grounding from the knowledge store,
//! answers through the provider chain and logs the exchange. Retrieval
//! failures degrade to an ungrounded answer; only malformed input is an
//! error.

use crate::quota_store::SqliteCounterStore;
use crate::rag::{
    query_hash, GroundingContext, LexicalRetriever, OrchestratedResponse, ProviderOrchestrator,
    SourceSelector,
};
use crate::store::{now, KnowledgeStore};
use crate::types::MessageRecord;
use concierge_core::config::ChatSettings;
use concierge_core::{AppConfig, AppError, AppResult};
use concierge_llm::{detect_intent, Intent, QuotaTracker, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Top score at which grounded confidence saturates.
const CONFIDENCE_SCALE: f32 = 40.0;

/// Reply to one chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    /// Answer in widget markup
    pub content: String,
    pub confidence: f32,
    pub intent: Intent,
    pub sources: Vec<String>,
    pub suggested_actions: Vec<String>,
    pub requires_human: bool,
    pub response_time_ms: u64,
    pub provider_used: String,
}

pub struct ChatEngine {
    store: Arc<KnowledgeStore>,
    retriever: LexicalRetriever,
    selector: SourceSelector,
    orchestrator: ProviderOrchestrator,
    settings: ChatSettings,
}

impl ChatEngine {
    pub fn new(
        store: Arc<KnowledgeStore>,
        retriever: LexicalRetriever,
        selector: SourceSelector,
        orchestrator: ProviderOrchestrator,
        settings: ChatSettings,
    ) -> Self {
        Self {
            store,
            retriever,
            selector,
            orchestrator,
            settings,
        }
    }

    /// Open the workspace database and assemble the engine from configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let store = Arc::new(KnowledgeStore::open(&config.database_path())?);
        let quota = Arc::new(QuotaTracker::from_settings(
            config.active_providers(),
            &config.quota,
            Arc::new(SqliteCounterStore::new(Arc::clone(&store))),
            Arc::new(SystemClock),
        ));
        let orchestrator = ProviderOrchestrator::from_config(config, quota)?;

        Ok(Self::new(
            store,
            LexicalRetriever::new(config.retrieval.clone()),
            SourceSelector::new(config.attribution.clone(), config.retrieval.domains.clone()),
            orchestrator,
            config.chat.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        self.orchestrator.quota()
    }

    pub fn orchestrator(&self) -> &ProviderOrchestrator {
        &self.orchestrator
    }

    /// Trimmed message, or `MalformedInput` when empty or too long.
    pub fn validate_message<'a>(&self, message: &'a str) -> AppResult<&'a str> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(AppError::MalformedInput("message is empty".to_string()));
        }
        if trimmed.chars().count() > self.settings.max_query_chars {
            return Err(AppError::MalformedInput(format!(
                "message is longer than {} characters",
                self.settings.max_query_chars
            )));
        }
        Ok(trimmed)
    }

    /// Rank active entries and pick citable sources.
    ///
    /// Returns `NoGroundingFound` when nothing scores above zero.
    pub fn ground(&self, query: &str) -> AppResult<GroundingContext> {
        let entries = self.store.active_entries()?;
        let candidates = self.retriever.search(query, &entries);
        if candidates.is_empty() {
            return Err(AppError::NoGroundingFound);
        }

        let sources = self.selector.select_sources(&candidates, query);
        Ok(GroundingContext::from_candidates(
            &candidates,
            sources,
            self.settings.max_context_entries,
        ))
    }

    pub async fn process_query(&self, message: &str, session_id: &str) -> AppResult<ChatResponse> {
        let started = Instant::now();
        let query = self.validate_message(message)?;
        let hash = query_hash(query);

        let grounding = match self.ground(query) {
            Ok(grounding) => grounding,
            Err(AppError::NoGroundingFound) => {
                tracing::debug!(query_hash = %hash, "No grounding found");
                GroundingContext::default()
            }
            Err(e) => {
                tracing::warn!(query_hash = %hash, error = %e, "Retrieval failed, answering without grounding");
                GroundingContext::default()
            }
        };

        let answer = self.orchestrator.respond(query, &grounding).await;
        let intent = detect_intent(query);
        let confidence = confidence(&grounding, &answer, intent);
        let requires_human = intent == Intent::HumanAgent
            || (grounding.is_empty() && intent == Intent::General && answer.from_rules);
        let response_time_ms = started.elapsed().as_millis() as u64;

        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            user_message: query.to_string(),
            assistant_response: answer.text.clone(),
            intent: intent.as_str().to_string(),
            provider_used: answer.provider_used.clone(),
            latency_ms: response_time_ms,
            sources: answer.sources.clone(),
            created_at: now(),
        };
        if let Err(e) = self.store.record_message(&record) {
            tracing::warn!(query_hash = %hash, error = %e, "Failed to log chat message");
        }

        tracing::info!(
            query_hash = %hash,
            session_id,
            intent = %intent,
            provider = %answer.provider_used,
            grounded = !grounding.is_empty(),
            sources = answer.sources.len(),
            latency_ms = response_time_ms,
            "Processed chat message"
        );

        Ok(ChatResponse {
            content: answer.text,
            confidence,
            intent,
            sources: answer.sources,
            suggested_actions: intent.suggested_actions(),
            requires_human,
            response_time_ms,
            provider_used: answer.provider_used,
        })
    }

    /// Logged exchanges of a session, oldest first.
    pub fn history(&self, session_id: &str) -> AppResult<Vec<MessageRecord>> {
        self.store.session_messages(session_id)
    }
}

fn confidence(grounding: &GroundingContext, answer: &OrchestratedResponse, intent: Intent) -> f32 {
    if !grounding.is_empty() {
        (grounding.top_score() as f32 / CONFIDENCE_SCALE).clamp(0.1, 0.95)
    } else if !answer.from_rules {
        0.4
    } else if intent != Intent::General {
        0.6
    } else {
        0.2
    }
}
