//! Configuration management for the Concierge workspace.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults (tuned retrieval and attribution policy)
//! - Config files (.concierge/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The score thresholds and cooldowns were tuned against observed traffic.
//! They are kept as named settings so deployments can override them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .concierge/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// SQLite database path override
    pub database: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Emit logs as JSON lines
    pub json_logs: bool,

    pub airport: AirportSettings,

    /// Ordered provider chain; the first entry is tried first.
    pub providers: Vec<ProviderSettings>,

    pub retrieval: RetrievalSettings,

    pub attribution: AttributionSettings,

    pub quota: QuotaSettings,

    pub scrape: ScrapeSettings,

    pub chat: ChatSettings,
}

/// Static facts about the airport used by the rule-based responder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AirportSettings {
    pub name: String,
    pub website: String,
    pub flight_status_url: String,
    pub parking_url: String,
    pub transport_url: String,
    pub security_url: String,
    pub contact_phone: String,
}

impl Default for AirportSettings {
    fn default() -> Self {
        Self {
            name: "the airport".to_string(),
            website: "https://www.example-airport.com".to_string(),
            flight_status_url: "https://www.example-airport.com/flights".to_string(),
            parking_url: "https://www.example-airport.com/parking".to_string(),
            transport_url: "https://www.example-airport.com/transportation".to_string(),
            security_url: "https://www.example-airport.com/security".to_string(),
            contact_phone: "+1 555 0100".to_string(),
        }
    }
}

/// Kind of backend behind a provider slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini generateContent API
    Gemini,
    /// Any OpenAI-compatible chat completions API (OpenAI, Groq, OpenRouter)
    #[serde(alias = "openai-compatible", alias = "groq")]
    OpenAi,
    /// Local Ollama runtime
    Ollama,
    /// Deterministic rule-based responder
    Rules,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
            Self::Rules => "rules",
        }
    }
}

/// One slot of the provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Identifier used in logs, quota status and `providerUsed`
    pub id: String,

    pub kind: ProviderKind,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub daily_limit: Option<u64>,

    #[serde(default)]
    pub rpm_limit: Option<u32>,

    #[serde(default)]
    pub tpm_limit: Option<u64>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

/// A topical domain used for affinity boosting and source filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainProfile {
    pub name: String,

    /// Query terms that mark a question as belonging to this domain
    pub keywords: Vec<String>,

    /// Entry categories that belong to this domain
    pub categories: Vec<String>,

    /// Category or URL-path fragments never cited for this domain
    #[serde(default)]
    pub exclusions: Vec<String>,
}

impl DomainProfile {
    fn new(name: &str, keywords: &[&str], categories: &[&str], exclusions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            categories: categories.iter().map(|s| s.to_string()).collect(),
            exclusions: exclusions.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Whether an entry category belongs to this domain. The whole category
    /// must name one of the domain's categories; `Lounge Food` is not dining.
    pub fn matches_category(&self, category: &str) -> bool {
        let category = normalize_category(category);
        self.categories
            .iter()
            .any(|c| normalize_category(c) == category)
    }

    /// Whether a category or source URL hits the exclusion list.
    ///
    /// Exclusion terms that name a category of one of `allowed` are skipped,
    /// so a query spanning parking and dining may still cite either.
    pub fn excludes(&self, category: &str, source_url: Option<&str>, allowed: &[&DomainProfile]) -> bool {
        let category = category.to_lowercase();
        let path = source_url.map(url_path).unwrap_or_default();
        self.exclusions
            .iter()
            .filter(|ex| !allowed.iter().any(|d| d.matches_category(ex)))
            .any(|ex| {
                let ex = ex.to_lowercase();
                category.contains(&ex) || path.contains(&ex)
            })
    }
}

/// Lowercased category words joined by single spaces.
fn normalize_category(category: &str) -> String {
    category
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased path portion of a URL (everything after the host).
fn url_path(url: &str) -> String {
    let lower = url.to_lowercase();
    let without_scheme = lower.split_once("://").map(|(_, rest)| rest).unwrap_or(&lower);
    match without_scheme.find('/') {
        Some(idx) => without_scheme[idx..].to_string(),
        None => String::new(),
    }
}

/// Lexical retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalSettings {
    /// Tokens shorter than this are dropped
    pub min_token_len: usize,
    pub max_keywords: usize,
    pub top_k: usize,
    pub question_weight: u32,
    pub answer_weight: u32,
    pub category_weight: u32,
    pub affinity_boost: u32,
    pub stop_words: Vec<String>,
    /// Airport and place names that carry no topical signal
    pub location_names: Vec<String>,
    pub domains: Vec<DomainProfile>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let stop_words = [
            "the", "and", "for", "are", "was", "were", "what", "where", "when", "which", "who",
            "whom", "why", "how", "can", "could", "would", "should", "does", "did", "have", "has",
            "had", "with", "from", "into", "onto", "about", "there", "here", "this", "that",
            "these", "those", "you", "your", "our", "any", "some", "please", "tell", "know",
            "want", "need", "get", "near", "inside", "outside", "around", "than", "then", "will",
            "may", "also", "just", "but", "not",
        ];
        let location_names = ["airport", "international", "city", "philippines", "mactan", "cebu"];

        Self {
            min_token_len: 3,
            max_keywords: 10,
            top_k: 8,
            question_weight: 5,
            answer_weight: 3,
            category_weight: 4,
            affinity_boost: 15,
            stop_words: stop_words.iter().map(|s| s.to_string()).collect(),
            location_names: location_names.iter().map(|s| s.to_string()).collect(),
            domains: default_domains(),
        }
    }
}

fn default_domains() -> Vec<DomainProfile> {
    vec![
        DomainProfile::new(
            "dining",
            &[
                "food", "eat", "eating", "restaurant", "restaurants", "dining", "dine", "cafe",
                "coffee", "kfc", "mcdonald", "mcdonalds", "jollibee", "starbucks", "burger",
                "pizza", "meal", "meals", "breakfast", "lunch", "dinner", "snack", "snacks",
                "drinks", "bakery", "halal", "vegetarian",
            ],
            &["dining", "food", "restaurant"],
            &["transport", "lounge", "parking", "taxi", "bus", "shuttle"],
        ),
        DomainProfile::new(
            "shopping",
            &["shop", "shops", "shopping", "store", "stores", "souvenir", "souvenirs", "duty", "pasalubong", "boutique"],
            &["shopping", "retail", "shops"],
            &["transport", "parking", "lounge"],
        ),
        DomainProfile::new(
            "parking",
            &["parking", "park", "car", "vehicle", "valet"],
            &["parking"],
            &["dining", "food", "shopping", "lounge"],
        ),
        DomainProfile::new(
            "transportation",
            &["taxi", "bus", "shuttle", "grab", "transport", "transportation", "ride", "rental"],
            &["transport", "transportation"],
            &["dining", "food", "shopping", "lounge"],
        ),
    ]
}

/// Source attribution thresholds (strictly-greater-than comparisons).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributionSettings {
    /// Top candidate is cited when its score exceeds this
    pub high_confidence: u32,
    /// Any candidate is cited when its score exceeds this
    pub very_high: u32,
    /// Same-domain candidates are cited above this for domain queries
    pub domain_category: u32,
    /// Candidates sharing the top category are cited above this otherwise
    pub shared_category: u32,
}

impl Default for AttributionSettings {
    fn default() -> Self {
        Self {
            high_confidence: 15,
            very_high: 25,
            domain_category: 15,
            shared_category: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuotaSettings {
    /// Hour of day (UTC) at which daily counters roll over
    pub reset_hour_utc: u32,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self { reset_hour_utc: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScrapeSettings {
    /// Minimum hours between two scrapes of the same URL
    pub cooldown_hours: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self { cooldown_hours: 24 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSettings {
    /// Queries longer than this (in characters) are rejected
    pub max_query_chars: usize,
    /// Number of ranked entries passed to providers as grounding
    pub max_context_entries: usize,
    /// Prompt definition used for grounded answers
    pub prompt_id: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_query_chars: 1000,
            max_context_entries: 5,
            prompt_id: "airport.chat.grounded".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
    airport: Option<AirportSettings>,
    providers: Option<Vec<ProviderSettings>>,
    retrieval: Option<RetrievalSettings>,
    attribution: Option<AttributionSettings>,
    quota: Option<QuotaSettings>,
    scrape: Option<ScrapeSettings>,
    chat: Option<ChatSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
    database: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    json: Option<bool>,
}

/// The default provider chain: two hosted models, a local model, then rules.
pub fn default_providers() -> Vec<ProviderSettings> {
    vec![
        ProviderSettings {
            id: "gemini".to_string(),
            kind: ProviderKind::Gemini,
            model: "gemini-1.5-flash".to_string(),
            endpoint: None,
            api_key_env: Some("GEMINI_API_KEY".to_string()),
            timeout_secs: 15,
            daily_limit: Some(1500),
            rpm_limit: Some(15),
            tpm_limit: Some(1_000_000),
            enabled: true,
        },
        ProviderSettings {
            id: "groq".to_string(),
            kind: ProviderKind::OpenAi,
            model: "llama-3.1-8b-instant".to_string(),
            endpoint: Some("https://api.groq.com/openai/v1".to_string()),
            api_key_env: Some("GROQ_API_KEY".to_string()),
            timeout_secs: 15,
            daily_limit: Some(14_400),
            rpm_limit: Some(30),
            tpm_limit: Some(6_000),
            enabled: true,
        },
        ProviderSettings {
            id: "ollama".to_string(),
            kind: ProviderKind::Ollama,
            model: "llama3.2".to_string(),
            endpoint: Some("http://localhost:11434".to_string()),
            api_key_env: None,
            timeout_secs: 30,
            daily_limit: None,
            rpm_limit: None,
            tpm_limit: None,
            enabled: true,
        },
        ProviderSettings {
            id: "rules".to_string(),
            kind: ProviderKind::Rules,
            model: String::new(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: 1,
            daily_limit: None,
            rpm_limit: None,
            tpm_limit: None,
            enabled: true,
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            database: None,
            log_level: None,
            verbose: false,
            no_color: false,
            json_logs: false,
            airport: AirportSettings::default(),
            providers: default_providers(),
            retrieval: RetrievalSettings::default(),
            attribution: AttributionSettings::default(),
            quota: QuotaSettings::default(),
            scrape: ScrapeSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `CONCIERGE_WORKSPACE`: Override workspace path
    /// - `CONCIERGE_CONFIG`: Path to config file
    /// - `CONCIERGE_DATABASE`: SQLite database path
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// An explicit workspace or config file takes precedence over the
    /// environment.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace.or_else(|| std::env::var("CONCIERGE_WORKSPACE").ok().map(PathBuf::from)) {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("CONCIERGE_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.concierge_dir().join("config.yaml"),
        };

        if config_path.exists() {
            tracing::debug!("Loading config file {:?}", config_path);
            config = config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Ok(database) = std::env::var("CONCIERGE_DATABASE") {
            config.database = Some(PathBuf::from(database));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> AppResult<Self> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
            if let Some(database) = ws.database {
                result.database = Some(PathBuf::from(database));
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(json) = logging.json {
                result.json_logs = json;
            }
        }

        if let Some(airport) = config_file.airport {
            result.airport = airport;
        }
        if let Some(providers) = config_file.providers {
            result.providers = providers;
        }
        if let Some(retrieval) = config_file.retrieval {
            result.retrieval = retrieval;
        }
        if let Some(attribution) = config_file.attribution {
            result.attribution = attribution;
        }
        if let Some(quota) = config_file.quota {
            result.quota = quota;
        }
        if let Some(scrape) = config_file.scrape {
            result.scrape = scrape;
        }
        if let Some(chat) = config_file.chat {
            result.chat = chat;
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the YAML file.
    pub fn with_overrides(
        mut self,
        database: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
        json_logs: bool,
    ) -> Self {
        if let Some(database) = database {
            self.database = Some(database);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if json_logs {
            self.json_logs = true;
        }

        self
    }

    /// Get the path to the .concierge directory.
    pub fn concierge_dir(&self) -> PathBuf {
        self.workspace.join(".concierge")
    }

    /// Ensure the .concierge directory exists.
    pub fn ensure_concierge_dir(&self) -> AppResult<()> {
        let dir = self.concierge_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .concierge directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Resolved SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        match self.database {
            Some(ref path) if path.is_absolute() => path.clone(),
            Some(ref path) => self.workspace.join(path),
            None => self.concierge_dir().join("concierge.sqlite"),
        }
    }

    /// Enabled providers in chain order.
    pub fn active_providers(&self) -> impl Iterator<Item = &ProviderSettings> {
        self.providers.iter().filter(|p| p.enabled)
    }

    /// Resolve a provider's API key from its environment variable.
    pub fn resolve_api_key(&self, provider: &ProviderSettings) -> Option<String> {
        provider
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(AppError::Config("Provider id cannot be empty".to_string()));
            }
            if !seen.insert(provider.id.as_str()) {
                return Err(AppError::Config(format!(
                    "Duplicate provider id: {}",
                    provider.id
                )));
            }
            if provider.timeout_secs == 0 {
                return Err(AppError::Config(format!(
                    "Provider '{}' must have a non-zero timeout",
                    provider.id
                )));
            }
            if provider.kind != ProviderKind::Rules && provider.model.trim().is_empty() {
                return Err(AppError::Config(format!(
                    "Provider '{}' needs a model",
                    provider.id
                )));
            }
        }

        if self.quota.reset_hour_utc > 23 {
            return Err(AppError::Config(format!(
                "quota.resetHourUtc must be 0-23, got {}",
                self.quota.reset_hour_utc
            )));
        }

        if self.retrieval.top_k == 0 || self.retrieval.max_keywords == 0 {
            return Err(AppError::Config(
                "retrieval.topK and retrieval.maxKeywords must be positive".to_string(),
            ));
        }

        if self.attribution.very_high < self.attribution.high_confidence {
            return Err(AppError::Config(
                "attribution.veryHigh must not be below attribution.highConfidence".to_string(),
            ));
        }

        if self.chat.max_query_chars == 0 {
            return Err(AppError::Config("chat.maxQueryChars must be positive".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.providers.len(), 4);
        assert_eq!(config.providers[0].id, "gemini");
        assert_eq!(config.providers[3].kind, ProviderKind::Rules);
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.attribution.very_high, 25);
        assert_eq!(config.scrape.cooldown_hours, 24);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_concierge_dir_and_database_path() {
        let config = AppConfig::default();
        assert!(config.concierge_dir().ends_with(".concierge"));
        assert!(config.database_path().ends_with("concierge.sqlite"));

        let config = config.with_overrides(Some(PathBuf::from("data/kb.sqlite")), None, false, false, false);
        assert!(config.database_path().ends_with("data/kb.sqlite"));
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(None, None, true, true, true);
        assert!(config.verbose);
        assert!(config.no_color);
        assert!(config.json_logs);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_merge_yaml_overrides_sections() {
        let yaml = r#"
airport:
  name: Mactan-Cebu International Airport
attribution:
  highConfidence: 10
  veryHigh: 30
scrape:
  cooldownHours: 6
providers:
  - id: local
    kind: ollama
    model: llama3.2
    endpoint: http://localhost:11434
  - id: rules
    kind: rules
logging:
  json: true
"#;
        let merged = AppConfig::default().merge_yaml_str(yaml).unwrap();
        assert_eq!(merged.airport.name, "Mactan-Cebu International Airport");
        assert_eq!(merged.attribution.high_confidence, 10);
        assert_eq!(merged.attribution.very_high, 30);
        // Unset fields keep their defaults
        assert_eq!(merged.attribution.shared_category, 20);
        assert_eq!(merged.scrape.cooldown_hours, 6);
        assert_eq!(merged.providers.len(), 2);
        assert_eq!(merged.providers[0].timeout_secs, 15);
        assert!(merged.json_logs);
        assert!(merged.validate().is_ok());
    }

    #[test]
    fn test_provider_kind_aliases() {
        let kind: ProviderKind = serde_yaml::from_str("groq").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
        let kind: ProviderKind = serde_yaml::from_str("openai").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
    }

    #[test]
    fn test_validate_duplicate_provider() {
        let mut config = AppConfig::default();
        config.providers.push(config.providers[0].clone());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_reset_hour() {
        let mut config = AppConfig::default();
        config.quota.reset_hour_utc = 24;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_domain_profile_matching() {
        let dining = &RetrievalSettings::default().domains[0];
        assert!(dining.matches_category("Dining"));
        assert!(dining.matches_category(" Restaurant "));
        assert!(!dining.matches_category("food-court"));
        assert!(!dining.matches_category("Lounge Food"));
        assert!(!dining.matches_category("lounge"));

        assert!(dining.excludes("lounge", None, &[]));
        assert!(dining.excludes("general", Some("https://airport.test/transportation/taxi"), &[]));
        assert!(!dining.excludes("dining", Some("https://transport-hub.test/dining"), &[]));
    }

    #[test]
    fn test_exclusions_skip_allowed_domain_categories() {
        let domains = RetrievalSettings::default().domains;
        let dining = &domains[0];
        let parking = domains.iter().find(|d| d.name == "parking").unwrap();

        assert!(dining.excludes("parking", Some("https://airport.test/parking"), &[dining]));
        assert!(!dining.excludes("parking", Some("https://airport.test/parking"), &[dining, parking]));
        assert!(dining.excludes("parking", Some("https://airport.test/lounges"), &[dining, parking]));
    }

    #[test]
    fn test_load_from_missing_workspace() {
        let result = AppConfig::load_from(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let dir = temp.path().join(".concierge");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config.yaml"), "chat:\n  maxQueryChars: 200\n").unwrap();

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();
        assert_eq!(config.chat.max_query_chars, 200);
        assert_eq!(config.chat.max_context_entries, 5);
    }
}
