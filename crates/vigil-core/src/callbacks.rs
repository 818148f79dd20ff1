use crate::analytics::SessionResult;
use crate::error::ErrorKind;
use crate::resolver::Status;

/// Callback surface exposed to the presentation collaborator.
///
/// Every method is invoked from the engine's notifier task - never while an
/// internal lock is held, and a given callback type is never invoked
/// concurrently with itself. The receiver is responsible for any
/// thread-to-UI marshaling, and may call back into the engine freely.
pub trait EngineCallbacks: Send + Sync {
    fn on_status_change(&self, _status: Status, _display_text: &str) {}
    fn on_timer_tick(&self, _elapsed_seconds: u64) {}
    fn on_session_ended(&self, _result: &SessionResult) {}
    fn on_error(&self, _kind: ErrorKind, _message: &str) {}
    fn on_alert(&self, _level: usize, _message: &str) {}
}

/// No-op sink for headless embedding and tests.
pub struct NullCallbacks;

impl EngineCallbacks for NullCallbacks {}

/// Internal notification queued by the resolution step and drained by the
/// notifier task after locks are released.
#[derive(Debug)]
pub(crate) enum Notification {
    StatusChange(Status),
    TimerTick(u64),
    SessionEnded(SessionResult),
    Error(ErrorKind, String),
    Alert(usize, String),
}

pub(crate) fn dispatch(callbacks: &dyn EngineCallbacks, notification: &Notification) {
    match notification {
        Notification::StatusChange(status) => {
            callbacks.on_status_change(*status, status.display_text());
        }
        Notification::TimerTick(elapsed) => callbacks.on_timer_tick(*elapsed),
        Notification::SessionEnded(result) => callbacks.on_session_ended(result),
        Notification::Error(kind, message) => callbacks.on_error(*kind, message),
        Notification::Alert(level, message) => callbacks.on_alert(*level, message),
    }
}
