use serde::Serialize;
use thiserror::Error;

/// Why `start_session` refused to open a session.
///
/// Every variant is checked before any worker is spawned; a failed start
/// never leaves the engine partially running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error("a session is already running")]
    AlreadyRunning,
    #[error("no usage time remaining today")]
    TimeExhausted,
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

/// Errors from engine operations other than `start_session`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("no session is running")]
    NotRunning,
}

/// Classifier-side failure, produced at the signal-source boundary.
///
/// The polling loop decides what to do with each variant; none of them
/// propagate past it.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network blip, rate limit, bounded timeout. The previous good signal
    /// stays authoritative until the source recovers.
    #[error("transient classifier failure: {0}")]
    Transient(String),
    /// OS-level capability revoked. Fatal to the source that reported it.
    #[error("capability lost: {0}")]
    Permission(String),
    /// Classifier output did not fit the contract. Fails closed.
    #[error("malformed classifier output: {0}")]
    Malformed(String),
}

/// Error kinds surfaced to the presentation collaborator via `on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A source is temporarily offline; fired once per outage episode.
    SourceOffline,
    /// A classifier produced output the engine could not accept.
    DetectionError,
    /// Camera capability lost or denied mid-session.
    CameraDenied,
    /// Screen-monitoring capability lost or denied mid-session.
    ScreenPermission,
    /// The daily usage ceiling was reached; accrual has stopped.
    TimeExhausted,
}

impl ErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceOffline => "source_offline",
            Self::DetectionError => "detection_error",
            Self::CameraDenied => "camera_denied",
            Self::ScreenPermission => "screen_permission",
            Self::TimeExhausted => "time_exhausted",
        }
    }
}
