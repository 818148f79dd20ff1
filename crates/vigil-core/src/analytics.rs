use serde::{Deserialize, Serialize};

use crate::resolver::Status;
use crate::session::Event;

/// Statistics reduced from a finalized session's event log.
///
/// Accounting invariant: the five per-type totals sum to `total_seconds`
/// exactly, and `total_seconds` equals the session's wall-clock span, since
/// the event log partitions it without gaps or overlaps.
///
/// All values stay as float seconds for full precision; truncation to whole
/// units happens only at display time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_seconds: f64,
    pub present_seconds: f64,
    pub away_seconds: f64,
    pub gadget_seconds: f64,
    pub screen_distraction_seconds: f64,
    pub paused_seconds: f64,
    /// Everything except paused time; the denominator of the focus rate.
    pub active_seconds: f64,
    pub distracted_seconds: f64,
    /// `100 * present / active`, or 0 when nothing was active.
    pub focus_percentage: f64,
}

/// Reduce a closed event list into a summary.
#[must_use]
pub fn summarize(events: &[Event]) -> Summary {
    let mut summary = Summary::default();

    for event in events {
        let duration = event.duration_seconds();
        match event.event_type {
            Status::Present => summary.present_seconds += duration,
            Status::Away => summary.away_seconds += duration,
            Status::GadgetSuspected => summary.gadget_seconds += duration,
            Status::ScreenDistraction => summary.screen_distraction_seconds += duration,
            Status::Paused => summary.paused_seconds += duration,
        }
    }

    summary.active_seconds = summary.present_seconds
        + summary.away_seconds
        + summary.gadget_seconds
        + summary.screen_distraction_seconds;
    summary.distracted_seconds =
        summary.away_seconds + summary.gadget_seconds + summary.screen_distraction_seconds;
    summary.total_seconds = summary.active_seconds + summary.paused_seconds;
    summary.focus_percentage = if summary.active_seconds > 0.0 {
        (100.0 * summary.present_seconds / summary.active_seconds).clamp(0.0, 100.0)
    } else {
        0.0
    };

    summary
}

/// Export form of one event, as consumed by reporting collaborators.
/// Immutable once the owning session has stopped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedEvent {
    pub event_type: Status,
    /// ISO-8601.
    pub start_time: String,
    /// ISO-8601.
    pub end_time: String,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Convert closed events into the export schema.
#[must_use]
pub fn export_events(events: &[Event]) -> Vec<ExportedEvent> {
    events
        .iter()
        .filter_map(|event| {
            let end = event.end_time?;
            Some(ExportedEvent {
                event_type: event.event_type,
                start_time: event.start_time.to_rfc3339(),
                end_time: end.to_rfc3339(),
                duration_seconds: event.duration_seconds(),
                metadata: event.metadata.clone(),
            })
        })
        .collect()
}

/// What `stop_session` hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    pub summary: Summary,
    pub events: Vec<ExportedEvent>,
}

/// Format seconds as a human-readable duration like "1 hr 2 mins" or
/// "45 secs". Floors to whole seconds at display time only.
#[must_use]
pub fn format_duration(seconds: f64) -> String {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total = if seconds >= 0.0 { seconds as u64 } else { 0 };

    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} {}", if hours == 1 { "hr" } else { "hrs" }));
    }
    if mins > 0 {
        parts.push(format!("{mins} {}", if mins == 1 { "min" } else { "mins" }));
    }
    if secs > 0 && hours == 0 {
        parts.push(format!("{secs} {}", if secs == 1 { "sec" } else { "secs" }));
    }

    if parts.is_empty() {
        String::from("0 sec")
    } else {
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn event(status: Status, start: i64, end: i64) -> Event {
        Event {
            event_type: status,
            start_time: t(start),
            end_time: Some(t(end)),
            metadata: None,
        }
    }

    #[test]
    fn per_type_totals_sum_to_total() {
        let events = vec![
            event(Status::Present, 0, 600),
            event(Status::Away, 600, 700),
            event(Status::GadgetSuspected, 700, 760),
            event(Status::Paused, 760, 880),
            event(Status::ScreenDistraction, 880, 940),
            event(Status::Present, 940, 1200),
        ];
        let summary = summarize(&events);

        let sum = summary.present_seconds
            + summary.away_seconds
            + summary.gadget_seconds
            + summary.screen_distraction_seconds
            + summary.paused_seconds;
        assert!((sum - summary.total_seconds).abs() < 1e-9);
        assert!((summary.total_seconds - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn focus_percentage_excludes_paused_time() {
        let events = vec![
            event(Status::Present, 0, 60),
            event(Status::Paused, 60, 120),
            event(Status::Away, 120, 180),
        ];
        let summary = summarize(&events);
        // 60s present over 120s active.
        assert!((summary.focus_percentage - 50.0).abs() < 1e-9);
    }

    #[test]
    fn empty_session_has_zero_focus() {
        let summary = summarize(&[]);
        assert!((summary.focus_percentage - 0.0).abs() < f64::EPSILON);
        assert!((summary.total_seconds - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_paused_session_has_zero_focus() {
        let summary = summarize(&[event(Status::Paused, 0, 300)]);
        assert!((summary.focus_percentage - 0.0).abs() < f64::EPSILON);
        assert!((summary.paused_seconds - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn export_uses_iso_8601_and_durations() {
        let events = vec![event(Status::Present, 0, 90)];
        let exported = export_events(&events);
        assert_eq!(exported.len(), 1);
        assert!(exported[0].start_time.starts_with("2024-06-01T10:00:00"));
        assert!((exported[0].duration_seconds - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn format_duration_examples() {
        assert_eq!(format_duration(0.0), "0 sec");
        assert_eq!(format_duration(45.0), "45 secs");
        assert_eq!(format_duration(90.0), "1 min 30 secs");
        assert_eq!(format_duration(3725.0), "1 hr 2 mins");
        assert_eq!(format_duration(-5.0), "0 sec");
    }
}
