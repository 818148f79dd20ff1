use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One day's usage-ledger row. The engine loads it at startup and writes it
/// back when a session stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageDay {
    pub day: NaiveDate,
    pub seconds_used: f64,
    pub extension_seconds: f64,
    pub extensions_granted: u32,
}

impl UsageDay {
    #[must_use]
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            seconds_used: 0.0,
            extension_seconds: 0.0,
            extensions_granted: 0,
        }
    }
}

/// A finalized session with its summary columns. Immutable after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub mode: String,
    pub total_seconds: f64,
    pub present_seconds: f64,
    pub away_seconds: f64,
    pub gadget_seconds: f64,
    pub screen_distraction_seconds: f64,
    pub paused_seconds: f64,
    pub focus_percentage: f64,
}

/// One timeline segment of an archived session. Timestamps are kept in
/// their exported ISO-8601 form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub session_id: Uuid,
    pub event_type: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub metadata: Option<String>,
}

/// Aggregate totals for one calendar day, backing the daily summary view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayTotals {
    pub sessions: u32,
    pub total_seconds: f64,
    pub present_seconds: f64,
    pub distracted_seconds: f64,
    pub paused_seconds: f64,
}
