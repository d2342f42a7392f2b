//! Merging scraped pages into the knowledge store.
//!
//! A scrape replaces everything previously known about its URL: prior active
//! entries are deactivated, then every fresh row either revives the entry
//! with the same question (keeping its id) or creates a new one. The whole
//! pass runs in one transaction.

use crate::store::{db_err, insert_entry, now, timestamp, KnowledgeStore};
use crate::types::{DataSource, NewEntry, ReconcileStats, ScrapedPage};
use chrono::{DateTime, Duration, Utc};
use concierge_core::config::ScrapeSettings;
use concierge_core::{AppError, AppResult};
use rusqlite::{params, OptionalExtension};
use std::collections::HashSet;
use std::sync::Arc;

pub struct ScrapeReconciler {
    store: Arc<KnowledgeStore>,
    cooldown: Duration,
}

impl ScrapeReconciler {
    pub fn new(store: Arc<KnowledgeStore>, settings: &ScrapeSettings) -> Self {
        Self {
            store,
            cooldown: Duration::hours(settings.cooldown_hours as i64),
        }
    }

    /// Reconcile a page now. `force` ignores the cooldown.
    pub fn reconcile(&self, page: &ScrapedPage, force: bool) -> AppResult<ReconcileStats> {
        self.reconcile_at(page, force, now())
    }

    pub fn reconcile_at(
        &self,
        page: &ScrapedPage,
        force: bool,
        now: DateTime<Utc>,
    ) -> AppResult<ReconcileStats> {
        let url = page.url.trim();
        if url.is_empty() {
            return Err(AppError::MalformedInput("Scraped page has no URL".to_string()));
        }

        let mut conn = self.store.conn();
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;

        let last_scraped: Option<String> = tx
            .query_row(
                "SELECT last_scraped FROM scraped_sources WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("Failed to read scrape history"))?;

        if let Some(last) = last_scraped.as_deref() {
            let last = DateTime::parse_from_rfc3339(last)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| AppError::Database(format!("Bad last_scraped for {}: {}", url, e)))?;
            let ready_at = last + self.cooldown;
            if !force && now < ready_at {
                let retry_after_secs = (ready_at - now).num_seconds().max(1) as u64;
                tracing::warn!(url, retry_after_secs, "Re-scrape rejected during cooldown");
                return Err(AppError::ReconciliationConflict {
                    url: url.to_string(),
                    retry_after_secs,
                });
            }
        }

        let stamp = timestamp(now);

        let prior: HashSet<String> = {
            let mut stmt = tx
                .prepare("SELECT id FROM knowledge_entries WHERE source_url = ?1 AND is_active = 1")
                .map_err(db_err("Failed to prepare prior entry query"))?;
            let ids = stmt
                .query_map(params![url], |row| row.get::<_, String>(0))
                .map_err(db_err("Failed to query prior entries"))?
                .collect::<rusqlite::Result<HashSet<_>>>()
                .map_err(db_err("Failed to read prior entry"))?;
            ids
        };

        tx.execute(
            "UPDATE knowledge_entries SET is_active = 0, updated_at = ?2
             WHERE source_url = ?1 AND is_active = 1",
            params![url, stamp],
        )
        .map_err(db_err("Failed to deactivate prior entries"))?;

        let mut stats = ReconcileStats::default();
        let mut touched = HashSet::new();

        for fresh in &page.entries {
            let question = fresh.question.trim();
            let answer = fresh.answer.trim();
            if question.is_empty() || answer.is_empty() {
                stats.skipped += 1;
                continue;
            }
            let category = match fresh.category.trim() {
                "" => "general",
                c => c,
            };

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM knowledge_entries WHERE source_url = ?1 AND question = ?2
                     ORDER BY updated_at DESC, rowid DESC LIMIT 1",
                    params![url, question],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err("Failed to match entry"))?;

            match existing {
                Some(id) => {
                    tx.execute(
                        "UPDATE knowledge_entries
                         SET answer = ?2, category = ?3, keywords = ?4, is_active = 1, updated_at = ?5
                         WHERE id = ?1",
                        params![
                            id,
                            answer,
                            category,
                            serde_json::to_string(&fresh.keywords)?,
                            stamp
                        ],
                    )
                    .map_err(db_err("Failed to update entry"))?;
                    stats.updated += 1;
                    touched.insert(id);
                }
                None => {
                    let entry = NewEntry::new(category, question, answer)
                        .with_source_url(url)
                        .with_keywords(fresh.keywords.iter().cloned())
                        .with_data_source(DataSource::Scraping);
                    let created = insert_entry(&tx, entry, now)?;
                    stats.created += 1;
                    touched.insert(created.id);
                }
            }
        }

        stats.deactivated = prior.difference(&touched).count();

        tx.execute(
            "INSERT INTO scraped_sources (url, title, last_scraped) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE
             SET title = COALESCE(excluded.title, scraped_sources.title),
                 last_scraped = excluded.last_scraped",
            params![url, page.title, stamp],
        )
        .map_err(db_err("Failed to record scraped source"))?;

        tx.commit().map_err(db_err("Failed to commit reconciliation"))?;

        tracing::info!(
            url,
            created = stats.created,
            updated = stats.updated,
            deactivated = stats.deactivated,
            skipped = stats.skipped,
            "Reconciled scraped page"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryFilter, NewEntry, ScrapedEntry};
    use chrono::TimeZone;

    const URL: &str = "https://mcia.example/dining";

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn row(question: &str, answer: &str) -> ScrapedEntry {
        ScrapedEntry {
            question: question.to_string(),
            answer: answer.to_string(),
            keywords: ["food".to_string()].into_iter().collect(),
            category: "dining".to_string(),
        }
    }

    fn page(entries: Vec<ScrapedEntry>) -> ScrapedPage {
        ScrapedPage {
            url: URL.to_string(),
            title: Some("Dining".to_string()),
            entries,
        }
    }

    fn setup() -> (Arc<KnowledgeStore>, ScrapeReconciler) {
        let store = Arc::new(KnowledgeStore::open_in_memory().unwrap());
        let reconciler = ScrapeReconciler::new(Arc::clone(&store), &ScrapeSettings::default());
        (store, reconciler)
    }

    fn active(store: &KnowledgeStore) -> Vec<crate::types::KnowledgeEntry> {
        store
            .list_entries(&EntryFilter {
                source_url: Some(URL.to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    #[test]
    fn test_first_scrape_creates_entries() {
        let (store, reconciler) = setup();
        let stats = reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 2"), row("Coffee?", "Level 1")]), false, at(1))
            .unwrap();

        assert_eq!(
            stats,
            ReconcileStats {
                created: 2,
                updated: 0,
                deactivated: 0,
                skipped: 0
            }
        );
        let entries = active(&store);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.data_source == DataSource::Scraping));

        let sources = store.list_sources().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].entry_count, 2);
        assert_eq!(sources[0].title.as_deref(), Some("Dining"));
        assert_eq!(sources[0].last_scraped, at(1));
    }

    #[test]
    fn test_rescrape_updates_in_place() {
        let (store, reconciler) = setup();
        reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 2")]), false, at(0))
            .unwrap();
        let original = active(&store)[0].clone();

        let stats = reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 3, gate 7")]), true, at(1))
            .unwrap();
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.created, 0);
        assert_eq!(stats.deactivated, 0);

        let entries = active(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, original.id);
        assert_eq!(entries[0].answer, "Level 3, gate 7");
        assert!(entries[0].updated_at > original.updated_at);
    }

    #[test]
    fn test_rescrape_deactivates_missing_rows() {
        let (store, reconciler) = setup();
        reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 2"), row("Coffee?", "Level 1")]), false, at(0))
            .unwrap();

        let stats = reconciler
            .reconcile_at(&page(vec![row("Coffee?", "Level 1")]), true, at(1))
            .unwrap();
        assert_eq!(stats.deactivated, 1);

        let entries = active(&store);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].question, "Coffee?");
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (store, reconciler) = setup();
        let fresh = page(vec![row("Where is KFC?", "Level 2"), row("Coffee?", "Level 1")]);

        reconciler.reconcile_at(&fresh, false, at(0)).unwrap();
        let once = active(&store).len();
        let stats = reconciler.reconcile_at(&fresh, true, at(1)).unwrap();

        assert_eq!(active(&store).len(), once);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.created, 0);
    }

    #[test]
    fn test_cooldown_rejects_with_retry_after() {
        let (_store, reconciler) = setup();
        reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 2")]), false, at(0))
            .unwrap();

        let err = reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 3")]), false, at(10))
            .unwrap_err();
        match err {
            AppError::ReconciliationConflict {
                url,
                retry_after_secs,
            } => {
                assert_eq!(url, URL);
                assert_eq!(retry_after_secs, 14 * 3600);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Past the cooldown the scrape goes through
        let later = at(0) + Duration::hours(24);
        assert!(reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 3")]), false, later)
            .is_ok());
    }

    #[test]
    fn test_rejected_scrape_changes_nothing() {
        let (store, reconciler) = setup();
        reconciler
            .reconcile_at(&page(vec![row("Where is KFC?", "Level 2")]), false, at(0))
            .unwrap();
        let _ = reconciler.reconcile_at(&page(vec![]), false, at(1));

        assert_eq!(active(&store).len(), 1);
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let (store, reconciler) = setup();
        let stats = reconciler
            .reconcile_at(
                &page(vec![row("  ", "Level 2"), row("Coffee?", ""), row("Wifi?", "Free")]),
                false,
                at(0),
            )
            .unwrap();

        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.created, 1);
        assert_eq!(active(&store).len(), 1);
    }

    #[test]
    fn test_other_urls_untouched() {
        let (store, reconciler) = setup();
        store
            .create_entry(
                NewEntry::new("parking", "Rates?", "50 per hour")
                    .with_source_url("https://mcia.example/parking"),
            )
            .unwrap();

        reconciler.reconcile_at(&page(vec![]), false, at(0)).unwrap();
        assert_eq!(store.active_entries().unwrap().len(), 1);
    }

    #[test]
    fn test_blank_url_is_malformed() {
        let (_store, reconciler) = setup();
        let mut blank = page(vec![row("q", "a")]);
        blank.url = " ".to_string();
        assert!(matches!(
            reconciler.reconcile(&blank, false),
            Err(AppError::MalformedInput(_))
        ));
    }
}
