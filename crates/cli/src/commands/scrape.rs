//! Scrape command handler.
//!
//! Reconciles scraper output (one page object or an array of pages) into
//! the knowledge base.

use super::{open_store, print_json};
use clap::Args;
use concierge_core::{config::AppConfig, AppError, AppResult};
use concierge_knowledge::{ReconcileStats, ScrapeReconciler, ScrapedPage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Deserialize)]
#[serde(untagged)]
enum ScrapeInput {
    Many(Vec<ScrapedPage>),
    One(ScrapedPage),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageOutcome {
    url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<ReconcileStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after_secs: Option<u64>,
}

/// Reconcile scraper output into the knowledge base
#[derive(Args, Debug)]
pub struct ScrapeCommand {
    /// JSON file produced by the scraper
    pub file: PathBuf,

    /// Ignore the re-scrape cooldown
    #[arg(long)]
    pub force: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ScrapeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Reconciling scraped pages from {:?}", self.file);

        let contents = std::fs::read_to_string(&self.file)?;
        let input: ScrapeInput = serde_json::from_str(&contents)?;
        let pages = match input {
            ScrapeInput::Many(pages) => pages,
            ScrapeInput::One(page) => vec![page],
        };

        let reconciler = ScrapeReconciler::new(open_store(config)?, &config.scrape);
        let mut outcomes = Vec::with_capacity(pages.len());

        // A page inside its cooldown is reported and skipped; other failures abort.
        for page in &pages {
            match reconciler.reconcile(page, self.force) {
                Ok(stats) => outcomes.push(PageOutcome {
                    url: page.url.clone(),
                    stats: Some(stats),
                    retry_after_secs: None,
                }),
                Err(AppError::ReconciliationConflict {
                    url,
                    retry_after_secs,
                }) => outcomes.push(PageOutcome {
                    url,
                    stats: None,
                    retry_after_secs: Some(retry_after_secs),
                }),
                Err(e) => return Err(e),
            }
        }

        if self.json {
            return print_json(&outcomes);
        }
        for outcome in &outcomes {
            match (&outcome.stats, outcome.retry_after_secs) {
                (Some(stats), _) => println!(
                    "{}: {} created, {} updated, {} deactivated, {} skipped",
                    outcome.url, stats.created, stats.updated, stats.deactivated, stats.skipped
                ),
                (None, Some(secs)) => println!(
                    "{}: scraped recently, retry in {}s (use --force to override)",
                    outcome.url, secs
                ),
                (None, None) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_single_page_or_array() {
        let one = r#"{"url": "https://x/dining", "entries": [{"question": "q", "answer": "a"}]}"#;
        let many = r#"[{"url": "https://x/a", "entries": []}, {"url": "https://x/b", "title": "B", "entries": []}]"#;

        match serde_json::from_str::<ScrapeInput>(one).unwrap() {
            ScrapeInput::One(page) => {
                assert_eq!(page.entries.len(), 1);
                assert_eq!(page.entries[0].category, "general");
            }
            ScrapeInput::Many(_) => panic!("expected a single page"),
        }
        match serde_json::from_str::<ScrapeInput>(many).unwrap() {
            ScrapeInput::Many(pages) => assert_eq!(pages.len(), 2),
            ScrapeInput::One(_) => panic!("expected an array"),
        }
    }
}
