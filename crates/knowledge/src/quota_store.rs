//! SQLite persistence for daily provider counters.
//!
//! Each increment is a single `INSERT ... ON CONFLICT DO UPDATE ... RETURNING`
//! statement, so concurrent callers (threads or processes sharing the file)
//! never lose an update.

use crate::store::{timestamp, KnowledgeStore};
use chrono::{DateTime, Utc};
use concierge_core::{AppError, AppResult};
use concierge_llm::CounterStore;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

pub struct SqliteCounterStore {
    store: Arc<KnowledgeStore>,
}

impl SqliteCounterStore {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }
}

impl CounterStore for SqliteCounterStore {
    fn daily_count(&self, provider: &str, window_start: DateTime<Utc>) -> AppResult<u64> {
        let conn = self.store.conn();
        conn.query_row(
            "SELECT used_count FROM provider_usage WHERE provider = ?1 AND window_start = ?2",
            params![provider, timestamp(window_start)],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|count| count.unwrap_or(0) as u64)
        .map_err(|e| AppError::Database(format!("Failed to read usage counter: {}", e)))
    }

    fn increment_daily(&self, provider: &str, window_start: DateTime<Utc>) -> AppResult<u64> {
        let conn = self.store.conn();
        conn.query_row(
            "INSERT INTO provider_usage (provider, window_start, used_count) VALUES (?1, ?2, 1)
             ON CONFLICT(provider, window_start) DO UPDATE SET used_count = used_count + 1
             RETURNING used_count",
            params![provider, timestamp(window_start)],
            |row| row.get::<_, i64>(0),
        )
        .map(|count| count as u64)
        .map_err(|e| AppError::Database(format!("Failed to increment usage counter: {}", e)))
    }

    fn try_increment_daily(
        &self,
        provider: &str,
        window_start: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Option<u64>> {
        if limit == 0 {
            return Ok(None);
        }

        let conn = self.store.conn();
        // The conflict branch only fires below the limit; otherwise no row comes back.
        conn.query_row(
            "INSERT INTO provider_usage (provider, window_start, used_count) VALUES (?1, ?2, 1)
             ON CONFLICT(provider, window_start) DO UPDATE SET used_count = used_count + 1
             WHERE used_count < ?3
             RETURNING used_count",
            params![provider, timestamp(window_start), limit as i64],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|count| count.map(|c| c as u64))
        .map_err(|e| AppError::Database(format!("Failed to increment usage counter: {}", e)))
    }
}
