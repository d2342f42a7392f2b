//! SQLite-backed knowledge store.
//!
//! Holds knowledge entries, scraped-source bookkeeping, the chat message log
//! and the daily provider usage counters. A single connection is shared
//! behind a mutex; every public method takes the lock for its whole duration.

use crate::types::{
    DataSource, EntryFilter, EntryUpdate, KnowledgeEntry, MessageRecord, NewEntry, ScrapedSource,
};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use concierge_core::{AppError, AppResult};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS knowledge_entries (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    subcategory TEXT,
    question TEXT NOT NULL,
    answer TEXT NOT NULL,
    keywords TEXT NOT NULL DEFAULT '[]',
    source_url TEXT,
    priority INTEGER NOT NULL DEFAULT 1,
    data_source TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_entries_source ON knowledge_entries(source_url, is_active);
CREATE INDEX IF NOT EXISTS idx_entries_category ON knowledge_entries(category);

CREATE TABLE IF NOT EXISTS scraped_sources (
    url TEXT PRIMARY KEY,
    title TEXT,
    last_scraped TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    user_message TEXT NOT NULL,
    assistant_response TEXT NOT NULL,
    intent TEXT NOT NULL,
    provider_used TEXT NOT NULL,
    latency_ms INTEGER NOT NULL,
    sources TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON chat_messages(session_id, created_at);

CREATE TABLE IF NOT EXISTS provider_usage (
    provider TEXT NOT NULL,
    window_start TEXT NOT NULL,
    used_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (provider, window_start)
);
"#;

const ENTRY_COLUMNS: &str = "id, category, subcategory, question, answer, keywords, source_url, \
                             priority, data_source, is_active, created_at, updated_at";

/// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time at storage precision.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, value: String) -> rusqlite::Result<T> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    let data_source: String = row.get(8)?;
    Ok(KnowledgeEntry {
        id: row.get(0)?,
        category: row.get(1)?,
        subcategory: row.get(2)?,
        question: row.get(3)?,
        answer: row.get(4)?,
        keywords: parse_json::<BTreeSet<String>>(5, row.get(5)?)?,
        source_url: row.get(6)?,
        priority: row.get::<_, i64>(7)?.max(1) as u32,
        data_source: DataSource::parse(&data_source).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e))
        })?,
        is_active: row.get(9)?,
        created_at: parse_timestamp(10, row.get(10)?)?,
        updated_at: parse_timestamp(11, row.get(11)?)?,
    })
}

pub(crate) fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Database(format!("{}: {}", context, e))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Persistent store for the assistant's knowledge and logs.
pub struct KnowledgeStore {
    conn: Mutex<Connection>,
}

impl KnowledgeStore {
    /// Open (or create) the store at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(db_err("Failed to open SQLite database"))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(db_err("Failed to set busy timeout"))?;

        let store = Self::init(conn)?;
        tracing::debug!("Opened knowledge store at {:?}", db_path);
        Ok(store)
    }

    /// Private in-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("Failed to open in-memory database"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(db_err("Failed to create tables"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// Insert a new entry.
    pub fn create_entry(&self, entry: NewEntry) -> AppResult<KnowledgeEntry> {
        let conn = self.conn();
        insert_entry(&conn, entry, now())
    }

    /// Insert many entries in one transaction. Invalid rows abort the batch.
    pub fn create_entries(&self, entries: Vec<NewEntry>) -> AppResult<Vec<KnowledgeEntry>> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;

        let now = now();
        let created = entries
            .into_iter()
            .map(|entry| insert_entry(&tx, entry, now))
            .collect::<AppResult<Vec<_>>>()?;

        tx.commit().map_err(db_err("Failed to commit entries"))?;
        tracing::info!("Imported {} knowledge entries", created.len());
        Ok(created)
    }

    pub fn get_entry(&self, id: &str) -> AppResult<Option<KnowledgeEntry>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM knowledge_entries WHERE id = ?1", ENTRY_COLUMNS),
            params![id],
            row_to_entry,
        )
        .optional()
        .map_err(db_err("Failed to load entry"))
    }

    /// Apply a partial update and refresh `updated_at`.
    pub fn update_entry(&self, id: &str, update: EntryUpdate) -> AppResult<KnowledgeEntry> {
        let conn = self.conn();
        let mut entry = conn
            .query_row(
                &format!("SELECT {} FROM knowledge_entries WHERE id = ?1", ENTRY_COLUMNS),
                params![id],
                row_to_entry,
            )
            .optional()
            .map_err(db_err("Failed to load entry"))?
            .ok_or_else(|| AppError::Knowledge(format!("Entry not found: {}", id)))?;

        if let Some(category) = update.category {
            entry.category = category;
        }
        if let Some(subcategory) = update.subcategory {
            entry.subcategory = Some(subcategory).filter(|s| !s.is_empty());
        }
        if let Some(question) = update.question {
            entry.question = question;
        }
        if let Some(answer) = update.answer {
            entry.answer = answer;
        }
        if let Some(keywords) = update.keywords {
            entry.keywords = keywords;
        }
        if let Some(source_url) = update.source_url {
            entry.source_url = Some(source_url).filter(|s| !s.is_empty());
        }
        if let Some(priority) = update.priority {
            if priority == 0 {
                return Err(AppError::MalformedInput("Priority must be at least 1".to_string()));
            }
            entry.priority = priority;
        }
        if let Some(is_active) = update.is_active {
            entry.is_active = is_active;
        }
        if entry.is_active && (entry.question.trim().is_empty() || entry.answer.trim().is_empty()) {
            return Err(AppError::MalformedInput(
                "Active entries need a question and an answer".to_string(),
            ));
        }
        entry.updated_at = now();

        conn.execute(
            "UPDATE knowledge_entries
             SET category = ?2, subcategory = ?3, question = ?4, answer = ?5, keywords = ?6,
                 source_url = ?7, priority = ?8, is_active = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                entry.id,
                entry.category,
                entry.subcategory,
                entry.question,
                entry.answer,
                serde_json::to_string(&entry.keywords)?,
                entry.source_url,
                entry.priority as i64,
                entry.is_active,
                timestamp(entry.updated_at),
            ],
        )
        .map_err(db_err("Failed to update entry"))?;

        tracing::debug!(id, "Updated knowledge entry");
        Ok(entry)
    }

    /// Soft delete. Returns whether an active entry was deactivated.
    pub fn deactivate_entry(&self, id: &str) -> AppResult<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE knowledge_entries SET is_active = 0, updated_at = ?2
                 WHERE id = ?1 AND is_active = 1",
                params![id, timestamp(now())],
            )
            .map_err(db_err("Failed to deactivate entry"))?;
        Ok(changed > 0)
    }

    /// Soft delete a list of ids in one transaction. Unknown ids are ignored.
    pub fn bulk_deactivate(&self, ids: &[String]) -> AppResult<usize> {
        let mut conn = self.conn();
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;
        let now = timestamp(now());

        let mut changed = 0;
        {
            let mut stmt = tx
                .prepare(
                    "UPDATE knowledge_entries SET is_active = 0, updated_at = ?2
                     WHERE id = ?1 AND is_active = 1",
                )
                .map_err(db_err("Failed to prepare bulk delete"))?;
            for id in ids {
                changed += stmt
                    .execute(params![id, now])
                    .map_err(db_err("Failed to deactivate entry"))?;
            }
        }

        tx.commit().map_err(db_err("Failed to commit bulk delete"))?;
        tracing::info!(requested = ids.len(), changed, "Bulk deactivated entries");
        Ok(changed)
    }

    /// List entries matching a filter, newest first.
    pub fn list_entries(&self, filter: &EntryFilter) -> AppResult<Vec<KnowledgeEntry>> {
        let mut clauses = Vec::new();
        let mut args: Vec<String> = Vec::new();

        if !filter.include_inactive {
            clauses.push("is_active = 1".to_string());
        }
        if let Some(category) = &filter.category {
            args.push(category.to_lowercase());
            clauses.push(format!("lower(category) = ?{}", args.len()));
        }
        if let Some(url) = &filter.source_url {
            args.push(url.clone());
            clauses.push(format!("source_url = ?{}", args.len()));
        }
        if let Some(term) = filter.search.as_deref().filter(|t| !t.trim().is_empty()) {
            args.push(like_pattern(term.trim()));
            clauses.push(format!(
                "(question LIKE ?{n} ESCAPE '\\' OR answer LIKE ?{n} ESCAPE '\\')",
                n = args.len()
            ));
        }

        let mut sql = format!("SELECT {} FROM knowledge_entries", ENTRY_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY updated_at DESC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql).map_err(db_err("Failed to prepare query"))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), row_to_entry)
            .map_err(db_err("Failed to query entries"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Failed to read entry"))
    }

    /// Every active entry; the input of lexical retrieval.
    pub fn active_entries(&self) -> AppResult<Vec<KnowledgeEntry>> {
        self.list_entries(&EntryFilter::default())
    }

    /// Scraped sources with their derived active-entry counts.
    pub fn list_sources(&self) -> AppResult<Vec<ScrapedSource>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT s.url, s.title, s.last_scraped,
                        (SELECT COUNT(*) FROM knowledge_entries e
                         WHERE e.source_url = s.url AND e.is_active = 1)
                 FROM scraped_sources s
                 ORDER BY s.url",
            )
            .map_err(db_err("Failed to prepare sources query"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(ScrapedSource {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    last_scraped: parse_timestamp(2, row.get(2)?)?,
                    entry_count: row.get::<_, i64>(3)? as u64,
                })
            })
            .map_err(db_err("Failed to query sources"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Failed to read source"))
    }

    /// Append one exchange to the session log.
    pub fn record_message(&self, record: &MessageRecord) -> AppResult<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO chat_messages
             (id, session_id, user_message, assistant_response, intent, provider_used,
              latency_ms, sources, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id,
                record.session_id,
                record.user_message,
                record.assistant_response,
                record.intent,
                record.provider_used,
                record.latency_ms as i64,
                serde_json::to_string(&record.sources)?,
                timestamp(record.created_at),
            ],
        )
        .map_err(db_err("Failed to record message"))?;
        Ok(())
    }

    /// The log of one session, oldest first.
    pub fn session_messages(&self, session_id: &str) -> AppResult<Vec<MessageRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, session_id, user_message, assistant_response, intent, provider_used,
                        latency_ms, sources, created_at
                 FROM chat_messages WHERE session_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(db_err("Failed to prepare message query"))?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(MessageRecord {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    user_message: row.get(2)?,
                    assistant_response: row.get(3)?,
                    intent: row.get(4)?,
                    provider_used: row.get(5)?,
                    latency_ms: row.get::<_, i64>(6)? as u64,
                    sources: parse_json(7, row.get(7)?)?,
                    created_at: parse_timestamp(8, row.get(8)?)?,
                })
            })
            .map_err(db_err("Failed to query messages"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("Failed to read message"))
    }
}

/// Validate and insert one entry on an open connection or transaction.
pub(crate) fn insert_entry(
    conn: &Connection,
    entry: NewEntry,
    now: DateTime<Utc>,
) -> AppResult<KnowledgeEntry> {
    entry.validate()?;

    let created = KnowledgeEntry {
        id: uuid::Uuid::new_v4().to_string(),
        category: entry.category.trim().to_string(),
        subcategory: entry.subcategory.filter(|s| !s.trim().is_empty()),
        question: entry.question.trim().to_string(),
        answer: entry.answer.trim().to_string(),
        keywords: entry.keywords,
        source_url: entry.source_url.filter(|s| !s.trim().is_empty()),
        priority: entry.priority,
        data_source: entry.data_source,
        is_active: true,
        created_at: now.trunc_subsecs(6),
        updated_at: now.trunc_subsecs(6),
    };

    conn.execute(
        &format!(
            "INSERT INTO knowledge_entries ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            ENTRY_COLUMNS
        ),
        params![
            created.id,
            created.category,
            created.subcategory,
            created.question,
            created.answer,
            serde_json::to_string(&created.keywords)?,
            created.source_url,
            created.priority as i64,
            created.data_source.as_str(),
            created.is_active,
            timestamp(created.created_at),
            timestamp(created.updated_at),
        ],
    )
    .map_err(db_err("Failed to insert entry"))?;

    Ok(created)
}
