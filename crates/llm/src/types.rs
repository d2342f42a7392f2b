//! Provider attempt bookkeeping.
//!
//! Every provider the orchestrator tries leaves one [`ProviderAttempt`]
//! behind, successful or not, so latency and fallback behavior can be
//! inspected after the fact.

use serde::{Deserialize, Serialize};

/// How a single provider attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    QuotaExceeded,
    Timeout,
    Error { message: String },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Timeout => "timeout",
            Self::Error { .. } => "error",
        }
    }
}

/// One provider attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider: String,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

impl ProviderAttempt {
    pub fn new(provider: impl Into<String>, outcome: AttemptOutcome, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            outcome,
            latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_labels() {
        assert!(AttemptOutcome::Success.is_success());
        assert_eq!(AttemptOutcome::Timeout.label(), "timeout");
        let err = AttemptOutcome::Error {
            message: "503".to_string(),
        };
        assert!(!err.is_success());
        assert_eq!(err.label(), "error");
    }

    #[test]
    fn test_attempt_serialization() {
        let attempt = ProviderAttempt::new("groq", AttemptOutcome::QuotaExceeded, 3);
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["provider"], "groq");
        assert_eq!(json["outcome"]["status"], "quota_exceeded");
        assert_eq!(json["latencyMs"], 3);
    }
}
