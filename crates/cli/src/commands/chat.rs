//! Chat command handler.
//!
//! Reads one question per line from stdin until EOF or `exit`.

use super::{print_json, print_response};
use clap::Args;
use concierge_core::{config::AppConfig, AppError, AppResult};
use concierge_knowledge::ChatEngine;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive chat session on stdin
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Session id for the message log (default: a fresh id)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Strip markup from answers
    #[arg(long)]
    pub plain: bool,

    /// Output one JSON document per answer
    #[arg(long)]
    pub json: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        tracing::info!(session = %session, "Starting chat session");

        let engine = ChatEngine::from_config(config)?;
        if !self.json {
            eprintln!(
                "Welcome to {}. Type your question, or 'exit' to leave.",
                config.airport.name
            );
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if matches!(line, "exit" | "quit") {
                break;
            }

            match engine.process_query(line, &session).await {
                Ok(response) if self.json => print_json(&response)?,
                Ok(response) => {
                    print_response(&response, self.plain);
                    println!();
                }
                Err(e @ AppError::MalformedInput(_)) => eprintln!("{}", e.user_message()),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to process message");
                    eprintln!("{}", e.user_message());
                }
            }
        }

        tracing::info!(session = %session, "Chat session ended");
        Ok(())
    }
}
