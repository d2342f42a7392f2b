//! Provider orchestration with deterministic fallback.
//!
//! Providers are tried once each, in configured order. A provider is skipped
//! when its quota has no headroom, abandoned when it exceeds its timeout, and
//! passed over when it errors or answers with nothing. The rule-based
//! responder closes every chain, so `respond` always produces an answer.

use crate::rag::types::{GroundingContext, OrchestratedResponse};
use concierge_core::config::ProviderKind;
use concierge_core::markup;
use concierge_core::{AppConfig, AppError, AppResult};
use concierge_llm::{
    create_client, AttemptOutcome, GroundedAnswer, LlmClient, LlmRequest, ProviderAttempt,
    QuotaTracker, RuleBasedResponder,
};
use concierge_prompt::{build_prompt, load_prompt, PromptDefinition};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Provider id reported when the rule-based responder answers.
pub const RULES_PROVIDER: &str = "rules";

/// Short stable fingerprint of a query for logs.
pub fn query_hash(query: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(query.as_bytes()));
    digest[..12].to_string()
}

/// One link of the provider chain.
pub struct ProviderSlot {
    pub id: String,
    pub client: Arc<dyn LlmClient>,
    pub model: String,
    pub timeout: Duration,
}

impl ProviderSlot {
    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: client.provider_name().to_string(),
            client,
            model: model.into(),
            timeout,
        }
    }
}

pub struct ProviderOrchestrator {
    slots: Vec<ProviderSlot>,
    quota: Arc<QuotaTracker>,
    rules: RuleBasedResponder,
    prompt: PromptDefinition,
    airport_name: String,

    /// Grounding whose top score is not above this is flagged low confidence
    low_confidence_at: u32,
}

impl ProviderOrchestrator {
    pub fn new(
        slots: Vec<ProviderSlot>,
        quota: Arc<QuotaTracker>,
        rules: RuleBasedResponder,
        prompt: PromptDefinition,
        airport_name: impl Into<String>,
    ) -> Self {
        Self {
            slots,
            quota,
            rules,
            prompt,
            airport_name: airport_name.into(),
            low_confidence_at: 15,
        }
    }

    pub fn with_low_confidence_threshold(mut self, threshold: u32) -> Self {
        self.low_confidence_at = threshold;
        self
    }

    /// Build the chain from configuration.
    ///
    /// Providers that cannot be constructed (typically a missing API key) are
    /// left out with a warning; the rule-based responder is always appended.
    pub fn from_config(config: &AppConfig, quota: Arc<QuotaTracker>) -> AppResult<Self> {
        let mut slots = Vec::new();
        for settings in config.active_providers() {
            if settings.kind == ProviderKind::Rules {
                continue;
            }
            let api_key = config.resolve_api_key(settings);
            match create_client(settings, api_key.as_deref()) {
                Ok(client) => slots.push(ProviderSlot::new(
                    client,
                    settings.model.clone(),
                    Duration::from_secs(settings.timeout_secs),
                )),
                Err(e) => tracing::warn!(provider = %settings.id, error = %e, "Provider disabled"),
            }
        }

        let prompt = load_prompt(&config.workspace, &config.chat.prompt_id)?;
        tracing::debug!(
            providers = ?slots.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            prompt = %prompt.id,
            "Provider chain ready"
        );

        Ok(Self::new(
            slots,
            quota,
            RuleBasedResponder::new(config.airport.clone()),
            prompt,
            config.airport.name.clone(),
        )
        .with_low_confidence_threshold(config.attribution.high_confidence))
    }

    pub fn quota(&self) -> &Arc<QuotaTracker> {
        &self.quota
    }

    fn build_request(&self, query: &str, grounding: &GroundingContext) -> AppResult<LlmRequest> {
        let variables = json!({
            "query": query,
            "context": grounding.render(),
            "airportName": self.airport_name,
            "hasContext": !grounding.is_empty(),
            "lowConfidence": !grounding.is_empty() && grounding.top_score() <= self.low_confidence_at,
        });
        let built = build_prompt(&self.prompt, &variables)?;

        let mut request = LlmRequest::new(built.user, "")
            .with_temperature(built.temperature)
            .with_max_tokens(built.max_tokens);
        if let Some(system) = built.system {
            request = request.with_system(system);
        }
        Ok(request)
    }

    /// Answer a query, falling back through the chain. Never fails.
    pub async fn respond(&self, query: &str, grounding: &GroundingContext) -> OrchestratedResponse {
        let hash = query_hash(query);
        let mut attempts = Vec::with_capacity(self.slots.len() + 1);

        let request = match self.build_request(query, grounding) {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(query_hash = %hash, error = %e, "Failed to build prompt, using rules");
                return self.rules_response(query, grounding, attempts, &hash);
            }
        };

        for slot in &self.slots {
            if !self.quota.try_acquire(&slot.id) {
                let err = AppError::QuotaExceeded {
                    provider: slot.id.clone(),
                };
                tracing::info!(provider = %slot.id, query_hash = %hash, "{}", err);
                attempts.push(ProviderAttempt::new(&slot.id, AttemptOutcome::QuotaExceeded, 0));
                continue;
            }

            let started = Instant::now();
            let result =
                tokio::time::timeout(slot.timeout, slot.client.complete(&request.for_model(&slot.model)))
                    .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let err = match result {
                Ok(Ok(response)) if !response.content.trim().is_empty() => {
                    self.quota
                        .record_tokens(&slot.id, u64::from(response.usage.total_tokens));
                    tracing::info!(
                        provider = %slot.id,
                        query_hash = %hash,
                        latency_ms,
                        tokens = response.usage.total_tokens,
                        "Provider answered"
                    );
                    attempts.push(ProviderAttempt::new(&slot.id, AttemptOutcome::Success, latency_ms));
                    return OrchestratedResponse {
                        text: markup::normalize(&response.content),
                        sources: grounding.sources.clone(),
                        provider_used: slot.id.clone(),
                        from_rules: false,
                        attempts,
                    };
                }
                Ok(Ok(_)) => AppError::Llm(format!("{} returned an empty reply", slot.id)),
                Ok(Err(e)) => e,
                Err(_) => AppError::ProviderTimeout {
                    provider: slot.id.clone(),
                    timeout_ms: slot.timeout.as_millis() as u64,
                },
            };

            tracing::warn!(
                provider = %slot.id,
                query_hash = %hash,
                latency_ms,
                error = %err,
                "Provider failed, falling back"
            );
            let outcome = match err {
                AppError::ProviderTimeout { .. } => AttemptOutcome::Timeout,
                other => AttemptOutcome::Error {
                    message: other.to_string(),
                },
            };
            attempts.push(ProviderAttempt::new(&slot.id, outcome, latency_ms));
        }

        self.rules_response(query, grounding, attempts, &hash)
    }

    fn rules_response(
        &self,
        query: &str,
        grounding: &GroundingContext,
        mut attempts: Vec<ProviderAttempt>,
        hash: &str,
    ) -> OrchestratedResponse {
        let started = Instant::now();
        let grounded = grounding.top().map(|e| GroundedAnswer {
            question: &e.question,
            answer: &e.answer,
        });
        let reply = self.rules.respond(query, grounded);
        let latency_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            provider = RULES_PROVIDER,
            query_hash = %hash,
            intent = %reply.intent,
            grounded = reply.grounded,
            "Rule-based responder answered"
        );
        attempts.push(ProviderAttempt::new(RULES_PROVIDER, AttemptOutcome::Success, latency_ms));

        OrchestratedResponse {
            text: reply.text,
            sources: if reply.grounded {
                grounding.sources.clone()
            } else {
                Vec::new()
            },
            provider_used: RULES_PROVIDER.to_string(),
            from_rules: true,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::types::GroundingEntry;
    use concierge_core::config::AirportSettings;
    use concierge_llm::{
        MemoryCounterStore, QuotaLimits, ScriptedBehavior, ScriptedClient, SystemClock,
    };
    use concierge_prompt::{embedded_prompt, GROUNDED_CHAT_PROMPT};

    fn tracker() -> QuotaTracker {
        QuotaTracker::new(Arc::new(MemoryCounterStore::new()), Arc::new(SystemClock), 0)
    }

    fn orchestrator(clients: Vec<Arc<ScriptedClient>>, quota: QuotaTracker) -> ProviderOrchestrator {
        let slots = clients
            .into_iter()
            .map(|c| ProviderSlot::new(c, "test-model", Duration::from_millis(200)))
            .collect();
        ProviderOrchestrator::new(
            slots,
            Arc::new(quota),
            RuleBasedResponder::new(AirportSettings::default()),
            embedded_prompt(GROUNDED_CHAT_PROMPT).unwrap(),
            "Test Airport",
        )
    }

    fn grounding() -> GroundingContext {
        GroundingContext {
            entries: vec![GroundingEntry {
                question: "Where is KFC?".to_string(),
                answer: "KFC is on Level 2.".to_string(),
                category: "dining".to_string(),
                score: 23,
            }],
            sources: vec!["https://mcia.example/dining".to_string()],
        }
    }

    #[test]
    fn test_query_hash_is_stable_prefix() {
        let hash = query_hash("Where is KFC?");
        assert_eq!(hash.len(), 12);
        assert_eq!(hash, query_hash("Where is KFC?"));
        assert_ne!(hash, query_hash("Where is KFC"));
    }

    #[tokio::test]
    async fn test_first_provider_answers() {
        let p1 = Arc::new(ScriptedClient::replying("p1", "# KFC\n* Level 2"));
        let p2 = Arc::new(ScriptedClient::replying("p2", "unused"));
        let orch = orchestrator(vec![p1.clone(), p2.clone()], tracker());

        let response = orch.respond("Is KFC available?", &grounding()).await;
        assert_eq!(response.provider_used, "p1");
        assert_eq!(response.text, "**KFC**\n• Level 2");
        assert_eq!(response.sources, vec!["https://mcia.example/dining"]);
        assert!(!response.from_rules);
        assert_eq!(response.attempts.len(), 1);
        assert_eq!(p2.calls(), 0);
    }

    #[tokio::test]
    async fn test_errors_and_empty_replies_fall_through() {
        let p1 = Arc::new(ScriptedClient::failing("p1"));
        let p2 = Arc::new(ScriptedClient::new("p2", ScriptedBehavior::Empty));
        let p3 = Arc::new(ScriptedClient::replying("p3", "Level 2."));
        let orch = orchestrator(vec![p1, p2, p3], tracker());

        let response = orch.respond("Is KFC available?", &grounding()).await;
        assert_eq!(response.provider_used, "p3");
        let labels: Vec<_> = response.attempts.iter().map(|a| a.outcome.label()).collect();
        assert_eq!(labels, vec!["error", "error", "success"]);
    }

    #[tokio::test]
    async fn test_quota_and_timeout_then_success() {
        let quota = tracker().with_provider(
            "p1",
            QuotaLimits {
                daily_limit: Some(1),
                rpm_limit: None,
                tpm_limit: None,
            },
        );
        quota.record_call("p1").unwrap();

        let p1 = Arc::new(ScriptedClient::replying("p1", "never"));
        let p2 = Arc::new(ScriptedClient::new(
            "p2",
            ScriptedBehavior::Delayed {
                delay: Duration::from_secs(5),
                reply: "too late".to_string(),
            },
        ));
        let p3 = Arc::new(ScriptedClient::replying("p3", "KFC is on Level 2."));
        let orch = orchestrator(vec![p1.clone(), p2, p3], quota);

        let started = Instant::now();
        let response = orch.respond("Is KFC available?", &grounding()).await;
        let elapsed = started.elapsed();

        assert_eq!(response.provider_used, "p3");
        assert_eq!(p1.calls(), 0);
        assert_eq!(response.attempts[0].outcome, AttemptOutcome::QuotaExceeded);
        assert_eq!(response.attempts[1].outcome, AttemptOutcome::Timeout);
        assert!(response.attempts[1].latency_ms >= 200);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_all_providers_fail_uses_rules() {
        let orch = orchestrator(
            vec![
                Arc::new(ScriptedClient::failing("p1")),
                Arc::new(ScriptedClient::failing("p2")),
            ],
            tracker(),
        );

        let grounded = orch.respond("Is KFC available?", &grounding()).await;
        assert_eq!(grounded.provider_used, RULES_PROVIDER);
        assert!(grounded.from_rules);
        assert_eq!(grounded.text, "**Where is KFC?**\nKFC is on Level 2.");
        assert_eq!(grounded.sources, vec!["https://mcia.example/dining"]);
        assert_eq!(grounded.attempts.len(), 3);

        let ungrounded = orch.respond("hello", &GroundingContext::default()).await;
        assert_eq!(ungrounded.provider_used, RULES_PROVIDER);
        assert!(!ungrounded.text.is_empty());
        assert!(ungrounded.sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_uses_rules() {
        let orch = orchestrator(Vec::new(), tracker());
        let response = orch.respond("Where do I park?", &GroundingContext::default()).await;
        assert_eq!(response.provider_used, RULES_PROVIDER);
        assert_eq!(response.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_successful_reply_feeds_token_window() {
        let quota = tracker().with_provider(
            "p1",
            QuotaLimits {
                daily_limit: None,
                rpm_limit: Some(100),
                tpm_limit: Some(1_000_000),
            },
        );
        let orch = orchestrator(
            vec![Arc::new(ScriptedClient::replying("p1", "Level 2 food court"))],
            quota,
        );

        orch.respond("Is KFC available?", &grounding()).await;
        let status = orch.quota().status("p1").unwrap();
        assert_eq!(status.rpm_used, 1);
        assert!(status.tpm_used > 0);
    }
}
