use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resolver::{MonitoringMode, Status};

/// One tracked work period. Owned exclusively by the engine; exactly one is
/// active at a time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub mode: MonitoringMode,
    pub is_paused: bool,
}

impl Session {
    /// Open a session anchored at `start_time`. The timeline anchors on the
    /// first successful detection, not on the `start_session` call itself.
    #[must_use]
    pub fn new(mode: MonitoringMode, start_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time: None,
            mode,
            is_paused: false,
        }
    }
}

/// A closed or currently-open contiguous time segment of one status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: Status,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Option<String>,
}

impl Event {
    /// Duration in seconds; 0 while the event is still open.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        self.end_time.map_or(0.0, |end| {
            #[allow(clippy::cast_precision_loss)]
            let ms = (end - self.start_time).num_milliseconds() as f64;
            ms / 1000.0
        })
    }
}

/// Append-only ordered timeline of one session.
///
/// Invariant, held by construction: closed events are contiguous and
/// non-overlapping - each event starts where the previous one ended - and no
/// closed event has zero duration (such segments are dropped, as two status
/// changes within the same instant carry no time).
#[derive(Debug, Default)]
pub struct EventLog {
    closed: Vec<Event>,
    open: Option<Event>,
}

impl EventLog {
    /// Record the committed status at `now`. Extends the open event when the
    /// status is unchanged, otherwise closes it and opens a new segment.
    pub fn record(&mut self, status: Status, now: DateTime<Utc>, metadata: Option<String>) {
        match &mut self.open {
            Some(open) if open.event_type == status => {
                open.end_time = Some(now);
                if metadata.is_some() {
                    open.metadata = metadata;
                }
            }
            _ => {
                if let Some(mut finished) = self.open.take() {
                    finished.end_time = Some(now);
                    self.push_closed(finished);
                }
                self.open = Some(Event {
                    event_type: status,
                    start_time: now,
                    end_time: None,
                    metadata,
                });
            }
        }
    }

    /// Close the open event at `now`, typically at session stop.
    pub fn close(&mut self, now: DateTime<Utc>) {
        if let Some(mut open) = self.open.take() {
            open.end_time = Some(now);
            self.push_closed(open);
        }
    }

    fn push_closed(&mut self, event: Event) {
        if event.duration_seconds() <= 0.0 {
            log::debug!(
                "discarding zero-duration {} segment at {}",
                event.event_type,
                event.start_time
            );
            return;
        }
        // Dropped zero-duration segments can leave two adjacent events of
        // the same type; merge them to keep the timeline clean.
        if let Some(last) = self.closed.last_mut() {
            if last.event_type == event.event_type && last.end_time == Some(event.start_time) {
                last.end_time = event.end_time;
                if event.metadata.is_some() {
                    last.metadata = event.metadata;
                }
                return;
            }
        }
        self.closed.push(event);
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.closed
    }

    /// Status of the currently open segment.
    #[must_use]
    pub fn current_status(&self) -> Option<Status> {
        self.open.as_ref().map(|e| e.event_type)
    }

    /// Active (non-paused) seconds up to `now`, including the open segment.
    /// Freezes while paused, since the open segment is then a `paused` one.
    #[must_use]
    pub fn active_seconds(&self, now: DateTime<Utc>) -> f64 {
        let closed: f64 = self
            .closed
            .iter()
            .filter(|e| e.event_type != Status::Paused)
            .map(Event::duration_seconds)
            .sum();
        let open = self
            .open
            .as_ref()
            .filter(|e| e.event_type != Status::Paused)
            .map_or(0.0, |e| {
                #[allow(clippy::cast_precision_loss)]
                let ms = (now - e.start_time).num_milliseconds() as f64;
                (ms / 1000.0).max(0.0)
            });
        closed + open
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.open.is_none()
    }
}
