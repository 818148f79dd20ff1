pub mod config;
pub mod ledger;
pub mod report;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use vigil_storage::Database;

/// Open the default database.
pub fn open_db() -> Result<Database> {
    Database::new(None).context("Failed to open database")
}

/// Parse a YYYY-MM-DD argument, defaulting to today (UTC).
pub fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .context("Invalid date format. Use YYYY-MM-DD"),
        None => Ok(chrono::Utc::now().date_naive()),
    }
}
