//! Lexical retrieval over knowledge entries.
//!
//! Queries are reduced to a short list of keywords, every active entry is
//! scored by literal keyword occurrences in its question, answer and
//! category, and entries of a domain named by the query get a fixed boost.

use crate::types::KnowledgeEntry;
use concierge_core::config::{DomainProfile, RetrievalSettings};
use std::cmp::Reverse;
use std::collections::HashSet;

/// One entry scored against one query. Never persisted.
#[derive(Debug, Clone, Copy)]
pub struct ScoredCandidate<'a> {
    pub entry: &'a KnowledgeEntry,
    pub score: u32,

    /// Entry category lines up with the query (keyword or domain match)
    pub category_match: bool,
}

/// Lowercase and split on every non-alphanumeric character.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct LexicalRetriever {
    settings: RetrievalSettings,
    ignored: HashSet<String>,
}

impl LexicalRetriever {
    pub fn new(settings: RetrievalSettings) -> Self {
        let ignored = settings
            .stop_words
            .iter()
            .chain(settings.location_names.iter())
            .map(|w| w.to_lowercase())
            .collect();
        Self { settings, ignored }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// Distinct topical keywords of a query, in order of appearance.
    pub fn extract_keywords(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        tokenize(query)
            .into_iter()
            .filter(|t| t.chars().count() >= self.settings.min_token_len)
            .filter(|t| !self.ignored.contains(t))
            .filter(|t| seen.insert(t.clone()))
            .take(self.settings.max_keywords)
            .collect()
    }

    /// Domains whose keyword list intersects the given keywords.
    pub fn matched_domains(&self, keywords: &[String]) -> Vec<&DomainProfile> {
        self.settings
            .domains
            .iter()
            .filter(|d| {
                d.keywords
                    .iter()
                    .any(|k| keywords.iter().any(|kw| kw.eq_ignore_ascii_case(k)))
            })
            .collect()
    }

    /// Score one entry. Returns `(score, category_match)`.
    pub fn score_entry(
        &self,
        keywords: &[String],
        domains: &[&DomainProfile],
        entry: &KnowledgeEntry,
    ) -> (u32, bool) {
        let question = entry.question.to_lowercase();
        let answer = entry.answer.to_lowercase();
        let category = entry.category.to_lowercase();

        let mut score = 0u32;
        let mut category_match = false;
        for keyword in keywords {
            let in_question = question.matches(keyword.as_str()).count() as u32;
            let in_answer = answer.matches(keyword.as_str()).count() as u32;
            let in_category = category.matches(keyword.as_str()).count() as u32;

            score += in_question * self.settings.question_weight
                + in_answer * self.settings.answer_weight
                + in_category * self.settings.category_weight;
            category_match |= in_category > 0;
        }

        // Long free-text answers rarely repeat the query's words, so a
        // domain hit is rewarded on its own.
        for domain in domains {
            if domain.matches_category(&entry.category) {
                score += self.settings.affinity_boost;
                category_match = true;
            }
        }

        (score, category_match)
    }

    /// Rank active entries for a query, best first, at most `top_k`.
    ///
    /// An empty keyword set yields an empty result.
    pub fn search<'a>(&self, query: &str, entries: &'a [KnowledgeEntry]) -> Vec<ScoredCandidate<'a>> {
        let keywords = self.extract_keywords(query);
        if keywords.is_empty() {
            tracing::debug!("Query has no keywords after stop-word removal");
            return Vec::new();
        }
        let domains = self.matched_domains(&keywords);

        let mut candidates: Vec<ScoredCandidate<'a>> = entries
            .iter()
            .filter(|e| e.is_active)
            .filter_map(|entry| {
                let (score, category_match) = self.score_entry(&keywords, &domains, entry);
                (score > 0).then_some(ScoredCandidate {
                    entry,
                    score,
                    category_match,
                })
            })
            .collect();

        candidates.sort_by_key(|c| {
            (
                Reverse(c.score),
                Reverse(c.entry.priority),
                Reverse(c.entry.updated_at),
            )
        });
        candidates.truncate(self.settings.top_k);

        tracing::debug!(
            keywords = ?keywords,
            domains = ?domains.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
            results = candidates.len(),
            top_score = candidates.first().map(|c| c.score).unwrap_or(0),
            "Lexical search complete"
        );

        candidates
    }
}
