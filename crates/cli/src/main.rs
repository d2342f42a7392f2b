//! Concierge CLI
//!
//! Main entry point for the airport concierge command-line tool.
//! Answers traveller questions, manages the knowledge base and reports
//! provider quota usage.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ChatCommand, KnowledgeCommand, QuotaCommand, ScrapeCommand};
use concierge_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Airport concierge - grounded answers for travellers
#[derive(Parser, Debug)]
#[command(name = "concierge")]
#[command(about = "Airport chatbot knowledge retrieval and response engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "CONCIERGE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "CONCIERGE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(long, global = true, env = "CONCIERGE_DATABASE")]
    database: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ask a single question
    Ask(AskCommand),

    /// Interactive chat session on stdin
    Chat(ChatCommand),

    /// Knowledge base management
    Knowledge(KnowledgeCommand),

    /// Reconcile scraper output into the knowledge base
    Scrape(ScrapeCommand),

    /// Show provider quota usage
    Quota(QuotaCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from defaults, YAML and environment
    let config = AppConfig::load_from(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.database,
        cli.log_level,
        cli.verbose,
        cli.no_color,
        cli.json_logs,
    );

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color, config.json_logs)?;

    tracing::info!("Concierge CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Database: {:?}", config.database_path());
    tracing::debug!(
        "Providers: {:?}",
        config.active_providers().map(|p| p.id.as_str()).collect::<Vec<_>>()
    );

    // Ensure .concierge directory exists
    config.ensure_concierge_dir()?;

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Chat(_) => "chat",
        Commands::Knowledge(_) => "knowledge",
        Commands::Scrape(_) => "scrape",
        Commands::Quota(_) => "quota",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    // Route to command handlers
    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Knowledge(cmd) => cmd.execute(&config).await,
        Commands::Scrape(cmd) => cmd.execute(&config).await,
        Commands::Quota(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
