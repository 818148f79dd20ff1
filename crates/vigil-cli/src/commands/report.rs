//! Reporting commands over the archived event log.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tabled::{Table, Tabled};
use uuid::Uuid;
use vigil_core::format_duration;
use vigil_storage::StoredSession;

use super::{open_db, parse_date};

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Print the daily focus summary.
pub fn summary(date: Option<&str>, format: &str) -> Result<()> {
    let day = parse_date(date)?;
    let db = open_db()?;
    let totals = db.day_totals(day)?;

    if format.eq_ignore_ascii_case("json") {
        println!("{}", serde_json::to_string_pretty(&totals)?);
        return Ok(());
    }

    if totals.sessions == 0 {
        println!("No sessions recorded on {day}.");
        return Ok(());
    }

    let focus_pct = if totals.total_seconds - totals.paused_seconds > 0.0 {
        100.0 * totals.present_seconds / (totals.total_seconds - totals.paused_seconds)
    } else {
        0.0
    };

    let rows = vec![
        SummaryRow {
            metric: String::from("Sessions"),
            value: totals.sessions.to_string(),
        },
        SummaryRow {
            metric: String::from("Total time"),
            value: format_duration(totals.total_seconds),
        },
        SummaryRow {
            metric: String::from("Focussed"),
            value: format_duration(totals.present_seconds),
        },
        SummaryRow {
            metric: String::from("Distracted"),
            value: format_duration(totals.distracted_seconds),
        },
        SummaryRow {
            metric: String::from("Paused"),
            value: format_duration(totals.paused_seconds),
        },
        SummaryRow {
            metric: String::from("Focus rate"),
            value: format!("{focus_pct:.1}%"),
        },
    ];

    println!("Focus summary for {day}");
    println!("{}", Table::new(rows));
    Ok(())
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Focus")]
    focus: String,
    #[tabled(rename = "Session ID")]
    id: String,
}

impl From<&StoredSession> for HistoryRow {
    fn from(session: &StoredSession) -> Self {
        Self {
            started: session.start_time.format("%Y-%m-%d %H:%M").to_string(),
            mode: session.mode.clone(),
            duration: format_duration(session.total_seconds),
            focus: format!("{:.1}%", session.focus_percentage),
            id: session.id.to_string(),
        }
    }
}

/// List finished sessions over the last `days` days.
pub fn history(days: u32) -> Result<()> {
    let db = open_db()?;
    let end = Utc::now();
    let start = end - Duration::days(i64::from(days));
    let sessions = db.get_sessions(start, end)?;

    if sessions.is_empty() {
        println!("No sessions in the last {days} days.");
        return Ok(());
    }

    let rows: Vec<HistoryRow> = sessions.iter().map(HistoryRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Print an archived session's event timeline.
pub fn events(session_id: &str, format: &str) -> Result<()> {
    let id = Uuid::parse_str(session_id).context("Invalid session id")?;
    let db = open_db()?;
    let session = db
        .get_session(id)?
        .ok_or_else(|| anyhow::anyhow!("Session not found: {session_id}"))?;
    let events = db.get_events(id)?;

    if format.eq_ignore_ascii_case("json") {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!(
        "Session {} ({}, {} focus {:.1}%)",
        session.id,
        session.mode,
        format_duration(session.total_seconds),
        session.focus_percentage
    );

    let rows: Vec<EventRow> = events
        .iter()
        .map(|event| EventRow {
            status: event.event_type.clone(),
            from: clock_time(&event.start_time),
            to: clock_time(&event.end_time),
            duration: format_duration(event.duration_seconds),
            detail: event.metadata.clone().unwrap_or_default(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

/// Reduce an RFC 3339 timestamp to wall-clock form for display.
fn clock_time(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw).map_or_else(
        |_| raw.to_string(),
        |dt| dt.format("%H:%M:%S").to_string(),
    )
}
