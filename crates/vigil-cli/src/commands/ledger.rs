//! Usage ledger inspection and extension grants.

use anyhow::Result;
use chrono::Utc;
use clap::Subcommand;
use vigil_core::{format_duration, EngineConfig};
use vigil_storage::UsageDay;

use super::open_db;

#[derive(Subcommand, Debug)]
pub enum LedgerAction {
    /// Show today's balance
    Show,
    /// Grant an extension for today
    Grant {
        /// Extension length in minutes
        minutes: u64,
    },
}

/// Handle ledger commands.
pub fn handle(action: LedgerAction) -> Result<()> {
    match action {
        LedgerAction::Show => show(),
        LedgerAction::Grant { minutes } => grant(minutes),
    }
}

fn show() -> Result<()> {
    let config = EngineConfig::load()?;
    let db = open_db()?;
    let today = Utc::now().date_naive();
    let usage = db
        .get_usage_day(today)?
        .unwrap_or_else(|| UsageDay::empty(today));

    let ceiling = config.daily_ceiling_secs + usage.extension_seconds;
    let remaining = (ceiling - usage.seconds_used).max(0.0);

    println!("Usage ledger for {today}");
    println!("  Used:       {}", format_duration(usage.seconds_used));
    println!("  Ceiling:    {}", format_duration(ceiling));
    println!("  Remaining:  {}", format_duration(remaining));
    if usage.extensions_granted > 0 {
        println!(
            "  Extensions: {} (+{})",
            usage.extensions_granted,
            format_duration(usage.extension_seconds)
        );
    }
    if remaining <= 0.0 {
        println!("  No time left today. Grant an extension with `vigil ledger grant <minutes>`.");
    }
    Ok(())
}

fn grant(minutes: u64) -> Result<()> {
    let db = open_db()?;
    let today = Utc::now().date_naive();
    #[allow(clippy::cast_precision_loss)]
    let seconds = (minutes * 60) as f64;
    let usage = db.add_extension(today, seconds)?;
    println!(
        "Granted {} extension for {today} (total extensions: {})",
        format_duration(seconds),
        usage.extensions_granted
    );
    Ok(())
}
