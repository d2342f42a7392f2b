//! Quota command handler.
//!
//! Shows daily and per-minute usage of every provider in the chain.

use super::{open_store, print_json};
use clap::Args;
use concierge_core::{config::AppConfig, AppResult};
use concierge_knowledge::SqliteCounterStore;
use concierge_llm::{QuotaTracker, SystemClock};
use std::sync::Arc;

/// Show provider quota usage
#[derive(Args, Debug)]
pub struct QuotaCommand {
    /// Show configured upstream limits instead of usage
    #[arg(long)]
    pub limits: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

fn describe(limit: Option<impl std::fmt::Display>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |l| l.to_string())
}

impl QuotaCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let tracker = QuotaTracker::from_settings(
            config.active_providers(),
            &config.quota,
            Arc::new(SqliteCounterStore::new(open_store(config)?)),
            Arc::new(SystemClock),
        );

        if self.limits {
            let limits = tracker.real_limits();
            if self.json {
                return print_json(&limits);
            }
            for (provider, limit) in &limits {
                println!(
                    "{}: daily {}, rpm {}, tpm {}",
                    provider,
                    describe(limit.daily_limit),
                    describe(limit.rpm_limit),
                    describe(limit.tpm_limit)
                );
            }
            return Ok(());
        }

        let statuses = tracker.all_status()?;
        if self.json {
            return print_json(&statuses);
        }
        for (provider, status) in &statuses {
            match status.daily_limit {
                Some(limit) => println!(
                    "{}: {}/{} today ({:.1}%), resets {}",
                    provider,
                    status.used_count,
                    limit,
                    status.percentage_used(),
                    status.window_reset_at.to_rfc3339()
                ),
                None => println!("{}: {} calls today (no daily limit)", provider, status.used_count),
            }
        }
        Ok(())
    }
}
