//! Source attribution for ranked candidates.
//!
//! Decides which source URLs an answer may cite. Relevance alone is not
//! enough: a lounge page that happens to mention "located" must not be cited
//! for a question about a restaurant, so domain-specific queries also apply
//! each domain's exclusion list.

use crate::rag::search::{tokenize, ScoredCandidate};
use concierge_core::config::{AttributionSettings, DomainProfile};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct SourceSelector {
    thresholds: AttributionSettings,
    domains: Vec<DomainProfile>,
}

impl SourceSelector {
    pub fn new(thresholds: AttributionSettings, domains: Vec<DomainProfile>) -> Self {
        Self {
            thresholds,
            domains,
        }
    }

    /// Domains named by any token of the query.
    pub fn query_domains(&self, query: &str) -> Vec<&DomainProfile> {
        let tokens: HashSet<String> = tokenize(query).into_iter().collect();
        self.domains
            .iter()
            .filter(|d| d.keywords.iter().any(|k| tokens.contains(&k.to_lowercase())))
            .collect()
    }

    /// Distinct citable URLs in rank order.
    pub fn select_sources(&self, candidates: &[ScoredCandidate<'_>], query: &str) -> Vec<String> {
        let Some(top) = candidates.first() else {
            return Vec::new();
        };

        let domains = self.query_domains(query);
        let domain_query = !domains.is_empty();
        let t = &self.thresholds;

        let mut seen = HashSet::new();
        let mut sources = Vec::new();

        for (rank, candidate) in candidates.iter().enumerate() {
            let Some(url) = candidate.entry.source_url.as_deref() else {
                continue;
            };
            let category = candidate.entry.category.as_str();
            let in_query_domain = domains.iter().any(|d| d.matches_category(category));

            let included = (rank == 0 && candidate.score > t.high_confidence)
                || candidate.score > t.very_high
                || (domain_query && in_query_domain && candidate.score > t.domain_category)
                || (!domain_query
                    && category.eq_ignore_ascii_case(&top.entry.category)
                    && candidate.score > t.shared_category);
            if !included {
                continue;
            }

            if domain_query && domains.iter().any(|d| d.excludes(category, Some(url), &domains)) {
                tracing::debug!(url, category, score = candidate.score, "Excluded cross-domain source");
                continue;
            }

            if seen.insert(url) {
                sources.push(url.to_string());
            }
        }

        sources
    }
}
