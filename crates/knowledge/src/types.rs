//! Knowledge system type definitions.

use chrono::{DateTime, Utc};
use concierge_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where a knowledge entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Manual,
    Scraping,
    Import,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scraping => "scraping",
            Self::Import => "import",
        }
    }

    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "manual" => Ok(Self::Manual),
            "scraping" => Ok(Self::Scraping),
            "import" => Ok(Self::Import),
            other => Err(AppError::Knowledge(format!("Unknown data source: {}", other))),
        }
    }
}

/// A curated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeEntry {
    pub id: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory: Option<String>,
    pub question: String,

    /// Answer text in widget markup
    pub answer: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Tie-breaker between equally relevant entries, at least 1
    pub priority: u32,
    pub data_source: DataSource,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to create an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default = "default_data_source")]
    pub data_source: DataSource,
}

fn default_priority() -> u32 {
    1
}

fn default_data_source() -> DataSource {
    DataSource::Manual
}

impl NewEntry {
    pub fn new(
        category: impl Into<String>,
        question: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            subcategory: None,
            question: question.into(),
            answer: answer.into(),
            keywords: BTreeSet::new(),
            source_url: None,
            priority: default_priority(),
            data_source: default_data_source(),
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_data_source(mut self, data_source: DataSource) -> Self {
        self.data_source = data_source;
        self
    }

    /// Reject rows that would break the active-entry invariant.
    pub fn validate(&self) -> AppResult<()> {
        if self.question.trim().is_empty() {
            return Err(AppError::MalformedInput("Question cannot be empty".to_string()));
        }
        if self.answer.trim().is_empty() {
            return Err(AppError::MalformedInput("Answer cannot be empty".to_string()));
        }
        if self.category.trim().is_empty() {
            return Err(AppError::MalformedInput("Category cannot be empty".to_string()));
        }
        if self.priority == 0 {
            return Err(AppError::MalformedInput("Priority must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Partial update of an entry. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub question: Option<String>,
    pub answer: Option<String>,
    pub keywords: Option<BTreeSet<String>>,
    pub source_url: Option<String>,
    pub priority: Option<u32>,
    pub is_active: Option<bool>,
}

/// Filter for listing entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub category: Option<String>,
    pub source_url: Option<String>,

    /// Substring matched against question and answer
    pub search: Option<String>,
    pub include_inactive: bool,
    pub limit: Option<usize>,
}

/// A scraped page tracked by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedSource {
    pub url: String,
    pub title: Option<String>,
    pub last_scraped: DateTime<Utc>,

    /// Active entries currently attributed to this URL
    pub entry_count: u64,
}

/// One row produced by the scraper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedEntry {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default = "default_category")]
    pub category: String,
}

fn default_category() -> String {
    "general".to_string()
}

/// Scraper output for one URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapedPage {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub entries: Vec<ScrapedEntry>,
}

/// Outcome of reconciling one scraped page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileStats {
    pub created: usize,
    pub updated: usize,

    /// Previously active entries that were not in the fresh set
    pub deactivated: usize,

    /// Fresh rows dropped for an empty question or answer
    pub skipped: usize,
}

/// One processed chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub session_id: String,
    pub user_message: String,
    pub assistant_response: String,
    pub intent: String,
    pub provider_used: String,
    pub latency_ms: u64,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}
