use chrono::{DateTime, Duration, Utc};

use crate::resolver::Status;

/// One escalation step fired by the scheduler. Levels are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: usize,
    pub message: String,
}

/// Tracks continuous unfocused time and fires escalating alerts.
///
/// Each configured threshold fires at most once per unfocused episode; after
/// the last one, nothing more fires until the episode resets. Returning to
/// `Present` or entering `Paused` resets both the timer and the counter, so
/// a fresh episode starts its escalation from level 1.
#[derive(Debug)]
pub struct AlertScheduler {
    thresholds: Vec<Duration>,
    messages: Vec<String>,
    unfocused_since: Option<DateTime<Utc>>,
    alerts_fired: usize,
}

impl AlertScheduler {
    #[must_use]
    pub fn new(threshold_secs: &[u64], messages: Vec<String>) -> Self {
        Self {
            #[allow(clippy::cast_possible_wrap)]
            thresholds: threshold_secs
                .iter()
                .map(|s| Duration::seconds(*s as i64))
                .collect(),
            messages,
            unfocused_since: None,
            alerts_fired: 0,
        }
    }

    /// Feed one committed status; returns an alert when a threshold is
    /// crossed for the first time this episode.
    pub fn observe(&mut self, status: Status, now: DateTime<Utc>) -> Option<Alert> {
        if !status.is_unfocused() {
            if self.unfocused_since.is_some() {
                log::debug!("refocussed, resetting alert tracking");
            }
            self.reset();
            return None;
        }

        let since = *self.unfocused_since.get_or_insert(now);
        let threshold = self.thresholds.get(self.alerts_fired)?;
        if now - since >= *threshold {
            self.alerts_fired += 1;
            let message = self
                .messages
                .get(self.alerts_fired - 1)
                .cloned()
                .unwrap_or_else(|| String::from("Stay focussed"));
            log::info!("unfocussed alert #{} fired", self.alerts_fired);
            return Some(Alert {
                level: self.alerts_fired,
                message,
            });
        }
        None
    }

    /// Clear the episode. Also used directly on pause.
    pub fn reset(&mut self) {
        self.unfocused_since = None;
        self.alerts_fired = 0;
    }
}
