//! Knowledge command handler.
//!
//! Handles knowledge base management: manual entries, imports and the
//! scraped-source overview.

use super::{open_store, print_json};
use clap::{Args, Subcommand};
use concierge_core::{config::AppConfig, AppError, AppResult};
use concierge_knowledge::{
    DataSource, EntryFilter, EntryUpdate, KnowledgeEntry, KnowledgeStore, NewEntry,
};
use std::path::PathBuf;

/// Knowledge base management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Add an entry
    Add(KnowledgeAddCommand),
    /// List entries
    List(KnowledgeListCommand),
    /// Show one entry
    Show(KnowledgeShowCommand),
    /// Update fields of an entry
    Update(KnowledgeUpdateCommand),
    /// Deactivate an entry
    Delete(KnowledgeDeleteCommand),
    /// Deactivate several entries
    BulkDelete(KnowledgeBulkDeleteCommand),
    /// Import entries from a JSON file
    Import(KnowledgeImportCommand),
    /// List scraped sources
    Sources(KnowledgeSourcesCommand),
}

fn print_entry(entry: &KnowledgeEntry) {
    let status = if entry.is_active { "active" } else { "inactive" };
    println!("{} [{}] ({}, priority {})", entry.id, entry.category, status, entry.priority);
    println!("  Q: {}", entry.question);
    println!("  A: {}", entry.answer);
    if let Some(url) = &entry.source_url {
        println!("  Source: {}", url);
    }
    if !entry.keywords.is_empty() {
        let keywords: Vec<_> = entry.keywords.iter().map(String::as_str).collect();
        println!("  Keywords: {}", keywords.join(", "));
    }
}

fn find_entry(store: &KnowledgeStore, id: &str) -> AppResult<KnowledgeEntry> {
    store
        .get_entry(id)?
        .ok_or_else(|| AppError::Knowledge(format!("Entry not found: {}", id)))
}

/// Add an entry
#[derive(Args, Debug)]
pub struct KnowledgeAddCommand {
    #[arg(long)]
    pub category: String,

    #[arg(long)]
    pub question: String,

    #[arg(long)]
    pub answer: String,

    #[arg(long)]
    pub subcategory: Option<String>,

    /// Keyword (repeatable)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    #[arg(long)]
    pub source_url: Option<String>,

    #[arg(long, default_value = "1")]
    pub priority: u32,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeAddCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing knowledge add command");

        let mut entry = NewEntry::new(&self.category, &self.question, &self.answer)
            .with_keywords(self.keywords.iter().cloned())
            .with_priority(self.priority)
            .with_data_source(DataSource::Manual);
        entry.subcategory = self.subcategory.clone();
        if let Some(url) = &self.source_url {
            entry = entry.with_source_url(url);
        }

        let created = open_store(config)?.create_entry(entry)?;
        if self.json {
            print_json(&created)?;
        } else {
            println!("Created entry {}", created.id);
        }
        Ok(())
    }
}

/// List entries
#[derive(Args, Debug)]
pub struct KnowledgeListCommand {
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub source_url: Option<String>,

    /// Substring of the question or answer
    #[arg(long)]
    pub search: Option<String>,

    /// Include deactivated entries
    #[arg(long)]
    pub all: bool,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeListCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let filter = EntryFilter {
            category: self.category.clone(),
            source_url: self.source_url.clone(),
            search: self.search.clone(),
            include_inactive: self.all,
            limit: self.limit,
        };
        let entries = open_store(config)?.list_entries(&filter)?;

        if self.json {
            return print_json(&entries);
        }
        if entries.is_empty() {
            println!("No entries found");
        }
        for entry in &entries {
            print_entry(entry);
        }
        Ok(())
    }
}

/// Show one entry
#[derive(Args, Debug)]
pub struct KnowledgeShowCommand {
    pub id: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeShowCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = open_store(config)?;
        let entry = find_entry(&store, &self.id)?;
        if self.json {
            print_json(&entry)
        } else {
            print_entry(&entry);
            println!("  Created: {}", entry.created_at.to_rfc3339());
            println!("  Updated: {}", entry.updated_at.to_rfc3339());
            Ok(())
        }
    }
}

/// Update fields of an entry
#[derive(Args, Debug)]
pub struct KnowledgeUpdateCommand {
    pub id: String,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub subcategory: Option<String>,

    #[arg(long)]
    pub question: Option<String>,

    #[arg(long)]
    pub answer: Option<String>,

    /// Replace keywords (repeatable)
    #[arg(long = "keyword")]
    pub keywords: Vec<String>,

    #[arg(long)]
    pub source_url: Option<String>,

    #[arg(long)]
    pub priority: Option<u32>,

    /// Reactivate or deactivate the entry
    #[arg(long)]
    pub active: Option<bool>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeUpdateCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!(id = %self.id, "Executing knowledge update command");

        let update = EntryUpdate {
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            question: self.question.clone(),
            answer: self.answer.clone(),
            keywords: (!self.keywords.is_empty())
                .then(|| self.keywords.iter().cloned().collect()),
            source_url: self.source_url.clone(),
            priority: self.priority,
            is_active: self.active,
        };
        let updated = open_store(config)?.update_entry(&self.id, update)?;

        if self.json {
            print_json(&updated)
        } else {
            println!("Updated entry {}", updated.id);
            Ok(())
        }
    }
}

/// Deactivate an entry
#[derive(Args, Debug)]
pub struct KnowledgeDeleteCommand {
    pub id: String,
}

impl KnowledgeDeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = open_store(config)?;
        if store.deactivate_entry(&self.id)? {
            println!("Deactivated entry {}", self.id);
        } else {
            find_entry(&store, &self.id)?;
            println!("Entry {} was already inactive", self.id);
        }
        Ok(())
    }
}

/// Deactivate several entries
#[derive(Args, Debug)]
pub struct KnowledgeBulkDeleteCommand {
    #[arg(required = true)]
    pub ids: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeBulkDeleteCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let changed = open_store(config)?.bulk_deactivate(&self.ids)?;
        if self.json {
            print_json(&serde_json::json!({
                "requested": self.ids.len(),
                "deactivated": changed,
            }))
        } else {
            println!("Deactivated {} of {} entries", changed, self.ids.len());
            Ok(())
        }
    }
}

/// Import entries from a JSON file
#[derive(Args, Debug)]
pub struct KnowledgeImportCommand {
    /// JSON array of entries (category, question, answer, ...)
    pub file: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeImportCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Importing entries from {:?}", self.file);

        let contents = std::fs::read_to_string(&self.file)?;
        let entries: Vec<NewEntry> = serde_json::from_str(&contents)?;
        let entries = entries
            .into_iter()
            .map(|e| match e.data_source {
                DataSource::Manual => e.with_data_source(DataSource::Import),
                _ => e,
            })
            .collect();

        let created = open_store(config)?.create_entries(entries)?;
        if self.json {
            print_json(&serde_json::json!({ "imported": created.len() }))
        } else {
            println!("Imported {} entries", created.len());
            Ok(())
        }
    }
}

/// List scraped sources
#[derive(Args, Debug)]
pub struct KnowledgeSourcesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeSourcesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let sources = open_store(config)?.list_sources()?;
        if self.json {
            return print_json(&sources);
        }
        if sources.is_empty() {
            println!("No scraped sources");
        }
        for source in &sources {
            println!(
                "{} ({} active entries, last scraped {})",
                source.url,
                source.entry_count,
                source.last_scraped.to_rfc3339()
            );
            if let Some(title) = &source.title {
                println!("  {}", title);
            }
        }
        Ok(())
    }
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Add(cmd) => cmd.execute(config).await,
            KnowledgeAction::List(cmd) => cmd.execute(config).await,
            KnowledgeAction::Show(cmd) => cmd.execute(config).await,
            KnowledgeAction::Update(cmd) => cmd.execute(config).await,
            KnowledgeAction::Delete(cmd) => cmd.execute(config).await,
            KnowledgeAction::BulkDelete(cmd) => cmd.execute(config).await,
            KnowledgeAction::Import(cmd) => cmd.execute(config).await,
            KnowledgeAction::Sources(cmd) => cmd.execute(config).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace_config(dir: &TempDir) -> AppConfig {
        AppConfig {
            workspace: dir.path().to_path_buf(),
            database: Some(dir.path().join("concierge.sqlite")),
            ..AppConfig::default()
        }
    }

    #[tokio::test]
    async fn test_show_finds_stored_entry() {
        let dir = TempDir::new().unwrap();
        let config = workspace_config(&dir);
        let entry = open_store(&config)
            .unwrap()
            .create_entry(NewEntry::new("dining", "Where is KFC?", "Level 2 food court"))
            .unwrap();

        let show = KnowledgeShowCommand {
            id: entry.id.clone(),
            json: true,
        };
        assert!(show.execute(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_show_unknown_entry_fails() {
        let dir = TempDir::new().unwrap();
        let config = workspace_config(&dir);

        let show = KnowledgeShowCommand {
            id: "missing".to_string(),
            json: false,
        };
        assert!(matches!(show.execute(&config).await, Err(AppError::Knowledge(_))));
    }
}
