//! Ask command handler.
//!
//! Answers one question through the chat engine.

use super::{print_json, print_response};
use clap::Args;
use concierge_core::{config::AppConfig, AppError, AppResult};
use concierge_knowledge::ChatEngine;
use std::path::PathBuf;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "question")]
    pub file: Option<PathBuf>,

    /// Session id for the message log (default: a fresh id)
    #[arg(short, long)]
    pub session: Option<String>,

    /// Strip markup from the answer
    #[arg(long)]
    pub plain: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    fn question(&self) -> AppResult<String> {
        match (&self.question, &self.file) {
            (Some(question), _) => Ok(question.clone()),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                AppError::MalformedInput(format!("cannot read question file {:?}: {}", path, e))
            }),
            (None, None) => Err(AppError::MalformedInput("no question provided".to_string())),
        }
    }

    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let question = self.question()?;
        let session = self
            .session
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let engine = ChatEngine::from_config(config)?;
        let response = engine.process_query(&question, &session).await?;

        tracing::debug!(
            provider = %response.provider_used,
            confidence = response.confidence,
            sources = response.sources.len(),
            "Answer ready"
        );

        if self.json {
            print_json(&response)?;
        } else {
            print_response(&response, self.plain);
        }

        Ok(())
    }
}
