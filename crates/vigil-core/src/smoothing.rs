use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::resolver::Status;

/// Which smoothing strategy a session runs with. Exactly one is active per
/// session, selected at `start_session`; the two are never mixed per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SmoothingStrategy {
    /// Commit a status change only after it has been observed continuously
    /// for the grace window. A high-confidence observation bypasses the
    /// window entirely so an obvious gadget-in-hand registers immediately.
    GraceDebounce {
        grace_seconds: f64,
        confidence_bypass: f64,
    },
    /// Keep a fixed window of composite distraction scores in [0, 100] and
    /// compare the arithmetic mean against a threshold on every tick.
    RollingAverage { window: usize, threshold: f64 },
}

impl Default for SmoothingStrategy {
    fn default() -> Self {
        Self::GraceDebounce {
            grace_seconds: 2.0,
            confidence_bypass: 0.75,
        }
    }
}

/// Per-session smoothing state machine. Prevents a single noisy frame from
/// flipping the timeline.
#[derive(Debug)]
pub enum Smoother {
    Grace(GraceDebounce),
    Rolling(RollingAverage),
}

impl Smoother {
    #[must_use]
    pub fn new(strategy: SmoothingStrategy) -> Self {
        match strategy {
            SmoothingStrategy::GraceDebounce {
                grace_seconds,
                confidence_bypass,
            } => Self::Grace(GraceDebounce::new(grace_seconds, confidence_bypass)),
            SmoothingStrategy::RollingAverage { window, threshold } => {
                Self::Rolling(RollingAverage::new(window, threshold))
            }
        }
    }

    /// Feed one resolved status and get back the committed status for the
    /// timeline. `confidence` belongs to the signal that produced the
    /// resolved status.
    pub fn observe(&mut self, candidate: Status, confidence: f64, now: DateTime<Utc>) -> Status {
        match self {
            Self::Grace(g) => g.observe(candidate, confidence, now),
            Self::Rolling(r) => r.observe(candidate, confidence),
        }
    }
}

/// Grace-period debounce: a pending transition must survive the full grace
/// window; any reversion to the committed status cancels it.
#[derive(Debug)]
pub struct GraceDebounce {
    grace: Duration,
    confidence_bypass: f64,
    committed: Option<Status>,
    pending: Option<(Status, DateTime<Utc>)>,
}

impl GraceDebounce {
    #[must_use]
    pub fn new(grace_seconds: f64, confidence_bypass: f64) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let grace = Duration::milliseconds((grace_seconds * 1000.0) as i64);
        Self {
            grace,
            confidence_bypass,
            committed: None,
            pending: None,
        }
    }

    fn commit(&mut self, status: Status) -> Status {
        self.committed = Some(status);
        self.pending = None;
        status
    }

    pub fn observe(&mut self, candidate: Status, confidence: f64, now: DateTime<Utc>) -> Status {
        let Some(committed) = self.committed else {
            // First observation anchors the timeline.
            return self.commit(candidate);
        };

        if candidate == committed {
            // Reversion within the window cancels the pending transition.
            self.pending = None;
            return committed;
        }

        // Pause boundaries are user intent, not classifier noise: both the
        // pause itself and the first status after it skip the window.
        if candidate == Status::Paused || committed == Status::Paused {
            return self.commit(candidate);
        }

        // Only gadget candidates carry a real classifier confidence; the
        // presence-derived statuses are synthetic 1.0 and must not bypass.
        if candidate == Status::GadgetSuspected && confidence > self.confidence_bypass {
            log::debug!("high-confidence {candidate:?} ({confidence:.2}), committing immediately");
            return self.commit(candidate);
        }

        match self.pending {
            Some((pending, since)) if pending == candidate => {
                if now - since >= self.grace {
                    log::debug!("{candidate:?} held for the grace window, committing");
                    self.commit(candidate)
                } else {
                    committed
                }
            }
            _ => {
                self.pending = Some((candidate, now));
                committed
            }
        }
    }
}

/// Rolling-average score smoothing: the mean of the last `window` composite
/// scores decides distracted vs focused on every tick.
#[derive(Debug)]
pub struct RollingAverage {
    window: usize,
    threshold: f64,
    scores: VecDeque<f64>,
    last_distraction: Option<Status>,
}

impl RollingAverage {
    #[must_use]
    pub fn new(window: usize, threshold: f64) -> Self {
        Self {
            window: window.max(1),
            threshold,
            scores: VecDeque::new(),
            last_distraction: None,
        }
    }

    /// Push one score and report whether the window mean crosses the
    /// distraction threshold.
    pub fn classify(&mut self, score: f64) -> bool {
        if self.scores.len() == self.window {
            self.scores.pop_front();
        }
        self.scores.push_back(score);

        let mean = self.scores.iter().sum::<f64>() / self.scores.len() as f64;
        log::debug!("rolling mean {mean:.1} over {} scores", self.scores.len());
        mean > self.threshold
    }

    fn observe(&mut self, candidate: Status, confidence: f64) -> Status {
        if candidate == Status::Paused {
            self.scores.clear();
            self.last_distraction = None;
            return Status::Paused;
        }

        if candidate.is_unfocused() {
            self.last_distraction = Some(candidate);
        }

        if self.classify(composite_score(candidate, confidence)) {
            // The window can lag the live candidate; fall back to the most
            // recent distraction seen, never to a bare `Present`.
            self.last_distraction.unwrap_or(Status::Away)
        } else {
            Status::Present
        }
    }
}

/// Map a resolved status onto a composite distraction score in [0, 100].
fn composite_score(status: Status, confidence: f64) -> f64 {
    match status {
        Status::Present | Status::Paused => 0.0,
        Status::Away => 75.0,
        Status::ScreenDistraction => 70.0,
        Status::GadgetSuspected => 60.0 + 40.0 * confidence.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn debounce(grace_secs: f64) -> GraceDebounce {
        GraceDebounce::new(grace_secs, 0.75)
    }

    #[test]
    fn first_observation_commits_immediately() {
        let mut g = debounce(3.0);
        assert_eq!(g.observe(Status::Present, 1.0, t(0)), Status::Present);
    }

    #[test]
    fn candidate_one_tick_short_of_grace_never_commits() {
        let mut g = debounce(3.0);
        g.observe(Status::Present, 1.0, t(0));
        // Away observed at t=1..3, spanning 2s < 3s grace, then reverts.
        assert_eq!(g.observe(Status::Away, 0.5, t(1)), Status::Present);
        assert_eq!(g.observe(Status::Away, 0.5, t(2)), Status::Present);
        assert_eq!(g.observe(Status::Present, 1.0, t(3)), Status::Present);
        // The cancelled transition must not leak into a later one.
        assert_eq!(g.observe(Status::Away, 0.5, t(4)), Status::Present);
    }

    #[test]
    fn candidate_held_exactly_the_grace_window_commits() {
        let mut g = debounce(3.0);
        g.observe(Status::Present, 1.0, t(0));
        assert_eq!(g.observe(Status::Away, 0.5, t(1)), Status::Present);
        assert_eq!(g.observe(Status::Away, 0.5, t(2)), Status::Present);
        assert_eq!(g.observe(Status::Away, 0.5, t(3)), Status::Present);
        assert_eq!(g.observe(Status::Away, 0.5, t(4)), Status::Away);
    }

    #[test]
    fn high_confidence_bypasses_the_window() {
        let mut g = debounce(10.0);
        g.observe(Status::Present, 1.0, t(0));
        assert_eq!(
            g.observe(Status::GadgetSuspected, 0.9, t(1)),
            Status::GadgetSuspected
        );
    }

    #[test]
    fn borderline_confidence_waits_for_the_window() {
        let mut g = debounce(3.0);
        g.observe(Status::Present, 1.0, t(0));
        assert_eq!(
            g.observe(Status::GadgetSuspected, 0.6, t(1)),
            Status::Present
        );
    }

    #[test]
    fn pause_and_resume_skip_the_window() {
        let mut g = debounce(5.0);
        g.observe(Status::Present, 1.0, t(0));
        assert_eq!(g.observe(Status::Paused, 1.0, t(1)), Status::Paused);
        assert_eq!(g.observe(Status::Present, 1.0, t(2)), Status::Present);
    }

    #[test]
    fn mean_below_threshold_resolves_focused() {
        let mut r = RollingAverage::new(5, 50.0);
        let mut distracted = false;
        for score in [45.0, 52.0, 55.0, 48.0, 42.0] {
            distracted = r.classify(score);
        }
        // mean 48.4
        assert!(!distracted);
    }

    #[test]
    fn mean_above_threshold_resolves_distracted() {
        let mut r = RollingAverage::new(5, 50.0);
        let mut distracted = false;
        for score in [45.0, 52.0, 65.0, 48.0, 42.0] {
            distracted = r.classify(score);
        }
        // mean 50.4
        assert!(distracted);
    }

    #[test]
    fn window_evicts_oldest_score() {
        let mut r = RollingAverage::new(2, 50.0);
        assert!(!r.classify(0.0));
        assert!(!r.classify(60.0)); // mean 30
        assert!(r.classify(80.0)); // window now [60, 80], mean 70
    }

    #[test]
    fn rolling_observe_reports_the_live_distraction_type() {
        let mut r = RollingAverage::new(1, 50.0);
        assert_eq!(r.observe(Status::Present, 1.0), Status::Present);
        assert_eq!(
            r.observe(Status::GadgetSuspected, 1.0),
            Status::GadgetSuspected
        );
    }

    #[test]
    fn rolling_pause_clears_the_window() {
        let mut r = RollingAverage::new(3, 50.0);
        r.observe(Status::GadgetSuspected, 1.0);
        r.observe(Status::GadgetSuspected, 1.0);
        assert_eq!(r.observe(Status::Paused, 1.0), Status::Paused);
        assert_eq!(r.observe(Status::Present, 1.0), Status::Present);
    }
}
