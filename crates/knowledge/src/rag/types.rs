//! Grounding and response types shared by the orchestrator and chat engine.

use crate::rag::search::ScoredCandidate;
use concierge_llm::ProviderAttempt;
use serde::{Deserialize, Serialize};

/// A ranked knowledge entry handed to providers as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingEntry {
    pub question: String,
    pub answer: String,
    pub category: String,
    pub score: u32,
}

/// Retrieval output for one query, detached from the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingContext {
    /// Best entries first
    pub entries: Vec<GroundingEntry>,

    /// URLs the answer may cite
    pub sources: Vec<String>,
}

impl GroundingContext {
    /// Keep the first `max_entries` candidates.
    pub fn from_candidates(
        candidates: &[ScoredCandidate<'_>],
        sources: Vec<String>,
        max_entries: usize,
    ) -> Self {
        Self {
            entries: candidates
                .iter()
                .take(max_entries)
                .map(|c| GroundingEntry {
                    question: c.entry.question.clone(),
                    answer: c.entry.answer.clone(),
                    category: c.entry.category.clone(),
                    score: c.score,
                })
                .collect(),
            sources,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn top(&self) -> Option<&GroundingEntry> {
        self.entries.first()
    }

    pub fn top_score(&self) -> u32 {
        self.top().map(|e| e.score).unwrap_or(0)
    }

    /// Evidence block for the prompt template.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .enumerate()
            .map(|(i, e)| {
                format!(
                    "[{}] ({})\nQ: {}\nA: {}",
                    i + 1,
                    e.category,
                    e.question.trim(),
                    e.answer.trim()
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Answer produced by the provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratedResponse {
    /// Answer in widget markup
    pub text: String,
    pub sources: Vec<String>,
    pub provider_used: String,

    /// Whether the deterministic responder produced the text
    pub from_rules: bool,
    pub attempts: Vec<ProviderAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grounding() -> GroundingContext {
        GroundingContext {
            entries: vec![
                GroundingEntry {
                    question: "Where is KFC?".to_string(),
                    answer: "Level 2, near gate 5.".to_string(),
                    category: "dining".to_string(),
                    score: 23,
                },
                GroundingEntry {
                    question: "Is there coffee?".to_string(),
                    answer: "Starbucks, Level 1.".to_string(),
                    category: "dining".to_string(),
                    score: 18,
                },
            ],
            sources: vec!["https://mcia.example/dining".to_string()],
        }
    }

    #[test]
    fn test_render_numbers_entries() {
        let text = grounding().render();
        assert!(text.starts_with("[1] (dining)\nQ: Where is KFC?\nA: Level 2, near gate 5."));
        assert!(text.contains("\n\n[2] (dining)"));
    }

    #[test]
    fn test_empty_context() {
        let empty = GroundingContext::default();
        assert!(empty.is_empty());
        assert_eq!(empty.top_score(), 0);
        assert_eq!(empty.render(), "");
        assert_eq!(grounding().top_score(), 23);
    }
}
