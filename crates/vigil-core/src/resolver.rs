use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signal::{RawSignal, StatusCandidate};

/// The single authoritative status for a moment in time, after combining all
/// active signal sources. Doubles as the event type on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Present,
    Away,
    GadgetSuspected,
    ScreenDistraction,
    Paused,
}

impl Status {
    /// Human-readable label passed to `on_status_change`.
    #[must_use]
    pub const fn display_text(self) -> &'static str {
        match self {
            Self::Present => "Focussed",
            Self::Away => "Away from Desk",
            Self::GadgetSuspected => "On another gadget",
            Self::ScreenDistraction => "Screen distraction",
            Self::Paused => "Paused",
        }
    }

    /// Whether this status counts toward an unfocused episode.
    #[must_use]
    pub const fn is_unfocused(self) -> bool {
        matches!(self, Self::Away | Self::GadgetSuspected | Self::ScreenDistraction)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Present => "present",
            Self::Away => "away",
            Self::GadgetSuspected => "gadget_suspected",
            Self::ScreenDistraction => "screen_distraction",
            Self::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(Self::Present),
            "away" => Ok(Self::Away),
            "gadget_suspected" => Ok(Self::GadgetSuspected),
            "screen_distraction" => Ok(Self::ScreenDistraction),
            "paused" => Ok(Self::Paused),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Which signal sources a session runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    CameraOnly,
    ScreenOnly,
    Both,
}

impl MonitoringMode {
    #[must_use]
    pub const fn needs_camera(self) -> bool {
        matches!(self, Self::CameraOnly | Self::Both)
    }

    #[must_use]
    pub const fn needs_screen(self) -> bool {
        matches!(self, Self::ScreenOnly | Self::Both)
    }
}

impl fmt::Display for MonitoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::CameraOnly => "camera_only",
            Self::ScreenOnly => "screen_only",
            Self::Both => "both",
        };
        write!(f, "{s}")
    }
}

/// Map one signal onto a status. `Unknown` fails safe to `Away` - a warming
/// or confused classifier must never claim the user is focused.
const fn candidate_status(signal: &RawSignal) -> Status {
    match signal.candidate {
        StatusCandidate::Present => Status::Present,
        StatusCandidate::Away | StatusCandidate::Unknown => Status::Away,
        StatusCandidate::Gadget => Status::GadgetSuspected,
        StatusCandidate::ScreenDistraction => Status::ScreenDistraction,
    }
}

/// Distraction rank used in `Both` mode: an active gadget outranks a blocked
/// tab, either outranks mere non-presence, which outranks full focus.
const fn rank(status: Status) -> u8 {
    match status {
        Status::Present => 0,
        Status::Away => 1,
        Status::ScreenDistraction => 2,
        Status::GadgetSuspected => 3,
        Status::Paused => 4,
    }
}

/// Resolve zero, one, or two concurrent signals into one authoritative
/// status. Pure function - same inputs always produce the same output.
///
/// Pause overrides everything: while paused the workers may keep polling to
/// stay warm, but their results never reach the timeline.
#[must_use]
pub fn resolve(
    mode: MonitoringMode,
    paused: bool,
    camera: Option<&RawSignal>,
    screen: Option<&RawSignal>,
) -> Status {
    if paused {
        return Status::Paused;
    }

    match mode {
        MonitoringMode::CameraOnly => camera.map_or(Status::Away, candidate_status),
        MonitoringMode::ScreenOnly => screen.map_or(Status::Away, candidate_status),
        MonitoringMode::Both => {
            // No signal from either source yet: fail safe, never `present`.
            if camera.is_none() && screen.is_none() {
                return Status::Away;
            }
            [camera, screen]
                .into_iter()
                .flatten()
                .map(candidate_status)
                .max_by_key(|s| rank(*s))
                .unwrap_or(Status::Away)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalKind;
    use chrono::Utc;

    fn signal(source: SignalKind, candidate: StatusCandidate) -> RawSignal {
        RawSignal {
            source,
            observed_at: Utc::now(),
            candidate,
            confidence: 1.0,
            detail: None,
        }
    }

    fn camera(candidate: StatusCandidate) -> RawSignal {
        signal(SignalKind::Camera, candidate)
    }

    fn screen(candidate: StatusCandidate) -> RawSignal {
        signal(SignalKind::Screen, candidate)
    }

    #[test]
    fn paused_overrides_everything() {
        let cam = camera(StatusCandidate::Gadget);
        let scr = screen(StatusCandidate::ScreenDistraction);
        assert_eq!(
            resolve(MonitoringMode::Both, true, Some(&cam), Some(&scr)),
            Status::Paused
        );
    }

    #[test]
    fn no_signal_yet_resolves_away() {
        assert_eq!(resolve(MonitoringMode::Both, false, None, None), Status::Away);
        assert_eq!(
            resolve(MonitoringMode::CameraOnly, false, None, None),
            Status::Away
        );
    }

    #[test]
    fn gadget_outranks_screen_distraction() {
        let cam = camera(StatusCandidate::Gadget);
        let scr = screen(StatusCandidate::ScreenDistraction);
        assert_eq!(
            resolve(MonitoringMode::Both, false, Some(&cam), Some(&scr)),
            Status::GadgetSuspected
        );
    }

    #[test]
    fn screen_distraction_outranks_away() {
        let cam = camera(StatusCandidate::Away);
        let scr = screen(StatusCandidate::ScreenDistraction);
        assert_eq!(
            resolve(MonitoringMode::Both, false, Some(&cam), Some(&scr)),
            Status::ScreenDistraction
        );
    }

    #[test]
    fn away_outranks_present() {
        let cam = camera(StatusCandidate::Away);
        let scr = screen(StatusCandidate::Present);
        assert_eq!(
            resolve(MonitoringMode::Both, false, Some(&cam), Some(&scr)),
            Status::Away
        );
    }

    #[test]
    fn both_present_resolves_present() {
        let cam = camera(StatusCandidate::Present);
        let scr = screen(StatusCandidate::Present);
        assert_eq!(
            resolve(MonitoringMode::Both, false, Some(&cam), Some(&scr)),
            Status::Present
        );
    }

    #[test]
    fn unknown_candidate_fails_safe_to_away() {
        let cam = camera(StatusCandidate::Unknown);
        assert_eq!(
            resolve(MonitoringMode::CameraOnly, false, Some(&cam), None),
            Status::Away
        );
    }

    #[test]
    fn single_source_modes_ignore_the_other_signal() {
        let cam = camera(StatusCandidate::Present);
        let scr = screen(StatusCandidate::ScreenDistraction);
        assert_eq!(
            resolve(MonitoringMode::CameraOnly, false, Some(&cam), Some(&scr)),
            Status::Present
        );
        assert_eq!(
            resolve(MonitoringMode::ScreenOnly, false, Some(&cam), Some(&scr)),
            Status::ScreenDistraction
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            Status::Present,
            Status::Away,
            Status::GadgetSuspected,
            Status::ScreenDistraction,
            Status::Paused,
        ] {
            assert_eq!(status.to_string().parse::<Status>().unwrap(), status);
        }
        assert!("booting".parse::<Status>().is_err());
    }

    #[test]
    fn resolution_is_deterministic() {
        let cam = camera(StatusCandidate::Gadget);
        let scr = screen(StatusCandidate::ScreenDistraction);
        let first = resolve(MonitoringMode::Both, false, Some(&cam), Some(&scr));
        for _ in 0..100 {
            assert_eq!(
                resolve(MonitoringMode::Both, false, Some(&cam), Some(&scr)),
                first
            );
        }
    }
}
