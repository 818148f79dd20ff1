use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use vigil_storage::{Database, StoredEvent, StoredSession, UsageDay};

use crate::alerts::AlertScheduler;
use crate::analytics::{export_events, summarize, SessionResult};
use crate::callbacks::{dispatch, EngineCallbacks, Notification, NullCallbacks};
use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind, SourceError, StartError};
use crate::ledger::UsageLedger;
use crate::permissions::{AssumeGranted, CapabilityProbe, CapabilityState};
use crate::resolver::{resolve, MonitoringMode, Status};
use crate::session::{EventLog, Session};
use crate::signal::{
    CameraFeed, CameraSource, RawSignal, ScreenProbe, ScreenSource, SignalKind, SignalSource,
    VisionClassifier,
};
use crate::smoothing::Smoother;

/// External collaborators injected into the engine. The engine never talks
/// to a camera, a screen, or a UI directly - only through these seams.
pub struct EngineDeps {
    pub camera_feed: Option<Arc<dyn CameraFeed>>,
    pub vision_classifier: Option<Arc<dyn VisionClassifier>>,
    pub screen_probe: Option<Arc<dyn ScreenProbe>>,
    pub capabilities: Arc<dyn CapabilityProbe>,
    pub callbacks: Arc<dyn EngineCallbacks>,
}

impl Default for EngineDeps {
    fn default() -> Self {
        Self {
            camera_feed: None,
            vision_classifier: None,
            screen_probe: None,
            capabilities: Arc::new(AssumeGranted),
            callbacks: Arc::new(NullCallbacks),
        }
    }
}

/// Non-blocking snapshot of the engine, polled by the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub is_paused: bool,
    pub current_status: Option<Status>,
    /// Active seconds, excluding paused time; frozen while paused.
    pub elapsed_seconds: u64,
    pub mode: Option<MonitoringMode>,
}

/// Shared session state behind the engine's single mutual-exclusion
/// boundary. Methods return the notifications to emit so callers can invoke
/// callbacks strictly after the lock is released.
struct SessionState {
    mode: MonitoringMode,
    running: bool,
    paused: bool,
    session: Option<Session>,
    log: EventLog,
    smoother: Smoother,
    alerts: AlertScheduler,
    camera_signal: Option<RawSignal>,
    screen_signal: Option<RawSignal>,
    current_status: Option<Status>,
    exhausted_notified: bool,
    ledger: UsageLedger,
}

impl SessionState {
    fn idle(config: &EngineConfig, ledger: UsageLedger) -> Self {
        Self {
            mode: MonitoringMode::Both,
            running: false,
            paused: false,
            session: None,
            log: EventLog::default(),
            smoother: Smoother::new(config.smoothing),
            alerts: AlertScheduler::new(
                &config.alert_thresholds_secs,
                config.alert_messages.clone(),
            ),
            camera_signal: None,
            screen_signal: None,
            current_status: None,
            exhausted_notified: false,
            ledger,
        }
    }

    /// Reset per-session state for a fresh run. Validation has already
    /// passed; the ledger carries over untouched.
    fn begin(&mut self, mode: MonitoringMode, config: &EngineConfig) {
        self.mode = mode;
        self.running = true;
        self.paused = false;
        self.session = None;
        self.log = EventLog::default();
        self.smoother = Smoother::new(config.smoothing);
        self.alerts = AlertScheduler::new(
            &config.alert_thresholds_secs,
            config.alert_messages.clone(),
        );
        self.camera_signal = None;
        self.screen_signal = None;
        self.current_status = None;
        self.exhausted_notified = false;
    }

    /// The resolution step: store the signal, resolve, smooth, extend the
    /// timeline, and report what changed.
    fn ingest(&mut self, signal: RawSignal, now: DateTime<Utc>) -> Vec<Notification> {
        if !self.running {
            return Vec::new();
        }

        match signal.source {
            SignalKind::Camera => self.camera_signal = Some(signal),
            SignalKind::Screen => self.screen_signal = Some(signal),
        }

        if self.paused && self.session.is_none() {
            // Keep the signal warm, but do not anchor a timeline while paused.
            return Vec::new();
        }

        let resolved = resolve(
            self.mode,
            self.paused,
            self.camera_signal.as_ref(),
            self.screen_signal.as_ref(),
        );
        let confidence = self.resolved_confidence(resolved);
        let committed = self.smoother.observe(resolved, confidence, now);

        if self.session.is_none() {
            self.session = Some(Session::new(self.mode, now));
            log::info!("first detection complete, session timer started");
        }

        let metadata = self.status_metadata(committed);
        self.log.record(committed, now, metadata);

        let mut out = Vec::new();
        if self.current_status != Some(committed) {
            self.current_status = Some(committed);
            out.push(Notification::StatusChange(committed));
        }
        if let Some(alert) = self.alerts.observe(committed, now) {
            out.push(Notification::Alert(alert.level, alert.message));
        }
        out
    }

    /// Confidence of the signal that produced the resolved status; 1.0 for
    /// presence-derived statuses.
    fn resolved_confidence(&self, resolved: Status) -> f64 {
        match resolved {
            Status::GadgetSuspected => self.camera_signal.as_ref().map_or(1.0, |s| s.confidence),
            Status::ScreenDistraction => self.screen_signal.as_ref().map_or(1.0, |s| s.confidence),
            _ => 1.0,
        }
    }

    fn status_metadata(&self, committed: Status) -> Option<String> {
        match committed {
            Status::GadgetSuspected => self.camera_signal.as_ref().and_then(|s| s.detail.clone()),
            Status::ScreenDistraction => self.screen_signal.as_ref().and_then(|s| s.detail.clone()),
            _ => None,
        }
    }

    /// 1 Hz housekeeping: ledger accrual, day rollover, exhaustion signal,
    /// UI tick.
    fn timer_tick(&mut self, now: DateTime<Utc>, tick_secs: f64) -> Vec<Notification> {
        if !self.running {
            return Vec::new();
        }

        self.ledger.rollover(now.date_naive());

        let mut out = Vec::new();
        if self.session.is_some() && !self.paused && !self.ledger.is_exhausted() {
            self.ledger.tick(tick_secs);
        }
        if self.session.is_some() && self.ledger.is_exhausted() && !self.exhausted_notified {
            self.exhausted_notified = true;
            log::warn!("daily usage ceiling reached; accrual stopped");
            out.push(Notification::Error(
                ErrorKind::TimeExhausted,
                String::from("Daily usage ceiling reached; no further time accrues"),
            ));
        }

        out.push(Notification::TimerTick(self.elapsed_seconds(now)));
        out
    }

    fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = self.log.active_seconds(now).max(0.0) as u64;
        secs
    }

    /// Idempotent: pausing an already-paused session is a no-op.
    fn pause(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
        if !self.running || self.paused {
            return Vec::new();
        }
        self.paused = true;
        if let Some(session) = &mut self.session {
            session.is_paused = true;
            self.log.record(Status::Paused, now, None);
        }
        self.alerts.reset();
        self.current_status = Some(Status::Paused);
        log::info!("session paused");
        vec![Notification::StatusChange(Status::Paused)]
    }

    /// Idempotent: resuming a running session is a no-op.
    fn resume(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
        if !self.running || !self.paused {
            return Vec::new();
        }
        self.paused = false;
        log::info!("session resumed");
        if let Some(session) = &mut self.session {
            session.is_paused = false;
            self.log.record(Status::Present, now, None);
            self.current_status = Some(Status::Present);
            vec![Notification::StatusChange(Status::Present)]
        } else {
            // Still warming up; the first detection will set the status.
            Vec::new()
        }
    }

    /// Drop the dead source's signal so `both` mode degrades to the
    /// surviving source. Single-source sessions keep their last status
    /// until the caller reacts to the error callback and stops.
    fn source_permission_lost(&mut self, kind: SignalKind) {
        match kind {
            SignalKind::Camera => self.camera_signal = None,
            SignalKind::Screen => self.screen_signal = None,
        }
    }

    /// Close the timeline, freeze the session, and reset to idle.
    fn finalize(&mut self, now: DateTime<Utc>) -> (SessionResult, Option<Session>) {
        self.log.close(now);
        let log = std::mem::take(&mut self.log);
        let summary = summarize(log.events());
        let result = SessionResult {
            summary,
            events: export_events(log.events()),
        };

        let mut session = self.session.take();
        if let Some(s) = &mut session {
            s.end_time = Some(now);
            s.is_paused = false;
            // Accounting invariant: the event log partitions the session.
            #[allow(clippy::cast_precision_loss)]
            let span = (now - s.start_time).num_milliseconds() as f64 / 1000.0;
            debug_assert!((result.summary.total_seconds - span).abs() < 0.005);
        }

        self.running = false;
        self.paused = false;
        self.camera_signal = None;
        self.screen_signal = None;
        self.current_status = None;
        self.exhausted_notified = false;
        (result, session)
    }
}

/// Everything a worker loop needs besides its signal source.
#[derive(Clone)]
struct LoopContext {
    state: Arc<Mutex<SessionState>>,
    tx: mpsc::UnboundedSender<Notification>,
    cancel: CancellationToken,
    poll_interval: Duration,
    poll_timeout: Duration,
}

fn send_all(tx: &mpsc::UnboundedSender<Notification>, notifications: Vec<Notification>) {
    for notification in notifications {
        let _ = tx.send(notification);
    }
}

fn lock_state(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Fire `on_error` once per outage episode; while offline, the previous
/// good signal simply stays authoritative in shared state.
fn notify_outage(
    offline: &mut bool,
    tx: &mpsc::UnboundedSender<Notification>,
    kind: SignalKind,
    err: &SourceError,
) {
    log::warn!("{kind:?} poll failed: {err}");
    if *offline {
        return;
    }
    *offline = true;
    let error_kind = match err {
        SourceError::Malformed(_) => ErrorKind::DetectionError,
        _ => ErrorKind::SourceOffline,
    };
    let _ = tx.send(Notification::Error(error_kind, err.to_string()));
}

/// One signal-source worker: poll on a fixed interval, bound each in-flight
/// classifier call, and run the resolution step on success.
#[allow(clippy::cognitive_complexity)]
async fn source_loop(source: Box<dyn SignalSource>, ctx: LoopContext) {
    let kind = source.kind();
    let mut ticker = interval(ctx.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut offline = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match tokio::time::timeout(ctx.poll_timeout, source.poll()).await {
                    Ok(Ok(signal)) => {
                        if offline {
                            offline = false;
                            log::info!("{kind:?} source recovered");
                        }
                        let notifications = lock_state(&ctx.state).ingest(signal, Utc::now());
                        send_all(&ctx.tx, notifications);
                    }
                    Ok(Err(SourceError::Permission(message))) => {
                        log::warn!("{kind:?} source lost its capability: {message}");
                        lock_state(&ctx.state).source_permission_lost(kind);
                        let error_kind = match kind {
                            SignalKind::Camera => ErrorKind::CameraDenied,
                            SignalKind::Screen => ErrorKind::ScreenPermission,
                        };
                        let _ = ctx.tx.send(Notification::Error(error_kind, message));
                        break;
                    }
                    Ok(Err(err)) => notify_outage(&mut offline, &ctx.tx, kind, &err),
                    Err(_) => notify_outage(
                        &mut offline,
                        &ctx.tx,
                        kind,
                        &SourceError::Transient(format!(
                            "classifier call exceeded {:?}",
                            ctx.poll_timeout
                        )),
                    ),
                }
            }
            () = ctx.cancel.cancelled() => {
                log::debug!("{kind:?} loop shutting down");
                break;
            }
        }
    }
}

/// Lightweight ~1 Hz tick driving ledger accrual and `on_timer_tick`. Polls
/// no classifier.
async fn timer_loop(ctx: LoopContext, tick_secs: f64) {
    let mut ticker = interval(ctx.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let notifications = lock_state(&ctx.state).timer_tick(Utc::now(), tick_secs);
                send_all(&ctx.tx, notifications);
            }
            () = ctx.cancel.cancelled() => break,
        }
    }
}

/// The detection orchestration and session-accounting engine.
///
/// Owns the session lifecycle, runs the signal-source loops as independent
/// tokio tasks, resolves and smooths their signals into one timeline, and
/// surfaces everything to the embedding collaborator through callbacks and
/// return values. No UI anywhere.
pub struct SessionEngine {
    config: EngineConfig,
    deps: EngineDeps,
    state: Arc<Mutex<SessionState>>,
    db: Option<Arc<Database>>,
    notify_tx: mpsc::UnboundedSender<Notification>,
    notify_rx: Option<mpsc::UnboundedReceiver<Notification>>,
    notifier: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    workers: Vec<JoinHandle<()>>,
}

impl SessionEngine {
    /// Build an engine. When a database is attached, today's usage ledger
    /// is restored from it and sessions are archived into it on stop.
    #[must_use]
    pub fn new(config: EngineConfig, deps: EngineDeps, db: Option<Arc<Database>>) -> Self {
        let today = Utc::now().date_naive();
        let ledger = match db.as_deref().map(|d| d.get_usage_day(today)) {
            Some(Ok(Some(row))) => UsageLedger::restore(
                row.day,
                row.seconds_used,
                config.daily_ceiling_secs,
                row.extension_seconds,
                row.extensions_granted,
            ),
            Some(Err(e)) => {
                log::warn!("failed to load usage ledger, starting fresh: {e}");
                UsageLedger::new(config.daily_ceiling_secs, today)
            }
            _ => UsageLedger::new(config.daily_ceiling_secs, today),
        };

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(SessionState::idle(&config, ledger)));

        Self {
            config,
            deps,
            state,
            db,
            notify_tx,
            notify_rx: Some(notify_rx),
            notifier: None,
            cancel: None,
            workers: Vec::new(),
        }
    }

    /// Start a session in the given mode.
    ///
    /// All failure checks run before any worker spawns, so a failed start
    /// never leaves the engine partially running.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning`, `TimeExhausted`, `ConfigInvalid` when a classifier
    /// is missing for the mode, or `PermissionDenied` when a required local
    /// capability is unavailable.
    pub async fn start_session(&mut self, mode: MonitoringMode) -> Result<(), StartError> {
        {
            let mut state = lock_state(&self.state);
            if state.running {
                return Err(StartError::AlreadyRunning);
            }

            state.ledger.rollover(Utc::now().date_naive());
            if state.ledger.is_exhausted() {
                return Err(StartError::TimeExhausted);
            }

            self.validate_mode_deps(mode)?;
            state.begin(mode, &self.config);
        }

        self.spawn_notifier();

        let cancel = CancellationToken::new();

        if mode.needs_camera() {
            if let (Some(feed), Some(classifier)) = (
                self.deps.camera_feed.clone(),
                self.deps.vision_classifier.clone(),
            ) {
                let source = Box::new(CameraSource::new(feed, classifier));
                let ctx = self.loop_ctx(&cancel, self.config.camera_poll_interval_secs);
                self.workers.push(tokio::spawn(source_loop(source, ctx)));
            }
        }

        if mode.needs_screen() {
            if let Some(probe) = self.deps.screen_probe.clone() {
                let source = Box::new(ScreenSource::new(probe));
                let ctx = self.loop_ctx(&cancel, self.config.screen_poll_interval_secs);
                self.workers.push(tokio::spawn(source_loop(source, ctx)));
            }
        }

        let tick_secs = self.config.timer_tick_interval_secs;
        let ctx = self.loop_ctx(&cancel, tick_secs);
        self.workers.push(tokio::spawn(timer_loop(ctx, tick_secs)));

        self.cancel = Some(cancel);
        log::info!("session started (mode: {mode})");
        Ok(())
    }

    /// Stop the running session: cancel the workers, wait for in-flight
    /// polls to finish within a bounded budget, close the timeline, and
    /// return the summary and event log.
    ///
    /// # Errors
    ///
    /// `EngineError::NotRunning` when no session is active.
    pub async fn stop_session(&mut self) -> Result<SessionResult, EngineError> {
        if !lock_state(&self.state).running {
            return Err(EngineError::NotRunning);
        }

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        let join_budget = Duration::from_secs_f64(self.config.poll_timeout_secs + 2.0);
        for handle in self.workers.drain(..) {
            match tokio::time::timeout(join_budget, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("worker task failed: {e}"),
                Err(_) => log::warn!("worker did not stop within {join_budget:?}"),
            }
        }

        let (result, finished) = lock_state(&self.state).finalize(Utc::now());
        self.persist(&result, finished.as_ref());

        let _ = self
            .notify_tx
            .send(Notification::SessionEnded(result.clone()));
        log::info!(
            "session stopped ({} events, {:.1}% focus)",
            result.events.len(),
            result.summary.focus_percentage
        );
        Ok(result)
    }

    /// Idempotent pause: freezes accrual and opens a `paused` segment.
    pub fn pause_session(&self) {
        let notifications = lock_state(&self.state).pause(Utc::now());
        send_all(&self.notify_tx, notifications);
    }

    /// Idempotent resume.
    pub fn resume_session(&self) {
        let notifications = lock_state(&self.state).resume(Utc::now());
        send_all(&self.notify_tx, notifications);
    }

    /// Non-blocking snapshot for the presentation layer.
    #[must_use]
    pub fn get_status(&self) -> StatusSnapshot {
        let state = lock_state(&self.state);
        StatusSnapshot {
            is_running: state.running,
            is_paused: state.paused,
            current_status: state.current_status,
            elapsed_seconds: state.elapsed_seconds(Utc::now()),
            mode: state.running.then_some(state.mode),
        }
    }

    /// Seconds left on today's usage ledger.
    #[must_use]
    pub fn usage_remaining(&self) -> f64 {
        lock_state(&self.state).ledger.remaining()
    }

    #[must_use]
    pub fn is_usage_exhausted(&self) -> bool {
        lock_state(&self.state).ledger.is_exhausted()
    }

    /// Extend today's ceiling, re-arming accrual and the exhaustion signal.
    pub fn grant_extension(&self, seconds: f64) {
        let mut state = lock_state(&self.state);
        state.ledger.grant_extension(seconds);
        state.exhausted_notified = false;
    }

    /// Classifier and capability checks for a mode. Runs before any worker
    /// spawns; a failed start never partially starts.
    fn validate_mode_deps(&self, mode: MonitoringMode) -> Result<(), StartError> {
        if mode.needs_camera() {
            if self.deps.camera_feed.is_none() {
                return Err(StartError::ConfigInvalid(String::from(
                    "no camera feed configured",
                )));
            }
            if self.deps.vision_classifier.is_none() {
                return Err(StartError::ConfigInvalid(String::from(
                    "no vision classifier configured",
                )));
            }
            match self.deps.capabilities.camera_access() {
                CapabilityState::Granted => {}
                CapabilityState::Denied => {
                    return Err(StartError::PermissionDenied(String::from(
                        "camera access denied; grant it in system settings",
                    )))
                }
                CapabilityState::Restricted => {
                    return Err(StartError::PermissionDenied(String::from(
                        "camera access is restricted on this device",
                    )))
                }
            }
        }

        if mode.needs_screen() {
            if self.deps.screen_probe.is_none() {
                return Err(StartError::ConfigInvalid(String::from(
                    "no screen probe configured",
                )));
            }
            if self.deps.capabilities.screen_access() != CapabilityState::Granted {
                return Err(StartError::PermissionDenied(String::from(
                    "screen monitoring permission missing",
                )));
            }
        }

        Ok(())
    }

    fn loop_ctx(&self, cancel: &CancellationToken, interval_secs: f64) -> LoopContext {
        LoopContext {
            state: Arc::clone(&self.state),
            tx: self.notify_tx.clone(),
            cancel: cancel.clone(),
            poll_interval: Duration::from_secs_f64(interval_secs),
            poll_timeout: Duration::from_secs_f64(self.config.poll_timeout_secs),
        }
    }

    /// The notifier task is the only place callbacks run, which serializes
    /// each callback type and keeps user code out of the engine's locks.
    fn spawn_notifier(&mut self) {
        if self.notifier.is_some() {
            return;
        }
        let Some(mut rx) = self.notify_rx.take() else {
            return;
        };
        let callbacks = Arc::clone(&self.deps.callbacks);
        self.notifier = Some(tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                dispatch(callbacks.as_ref(), &notification);
            }
        }));
    }

    fn persist(&self, result: &SessionResult, session: Option<&Session>) {
        let Some(db) = &self.db else { return };

        let ledger = lock_state(&self.state).ledger.clone();
        if let Err(e) = db.upsert_usage_day(&UsageDay {
            day: ledger.day(),
            seconds_used: ledger.seconds_used_today(),
            extension_seconds: ledger.extension_seconds(),
            extensions_granted: ledger.extensions_granted(),
        }) {
            log::warn!("failed to persist usage ledger: {e}");
        }

        let Some(session) = session else { return };
        let Some(end_time) = session.end_time else {
            return;
        };

        let stored = StoredSession {
            id: session.id,
            start_time: session.start_time,
            end_time,
            mode: session.mode.to_string(),
            total_seconds: result.summary.total_seconds,
            present_seconds: result.summary.present_seconds,
            away_seconds: result.summary.away_seconds,
            gadget_seconds: result.summary.gadget_seconds,
            screen_distraction_seconds: result.summary.screen_distraction_seconds,
            paused_seconds: result.summary.paused_seconds,
            focus_percentage: result.summary.focus_percentage,
        };
        let events: Vec<StoredEvent> = result
            .events
            .iter()
            .map(|event| StoredEvent {
                session_id: session.id,
                event_type: event.event_type.to_string(),
                start_time: event.start_time.clone(),
                end_time: event.end_time.clone(),
                duration_seconds: event.duration_seconds,
                metadata: event.metadata.clone(),
            })
            .collect();

        if let Err(e) = db.archive_session(&stored, &events) {
            log::warn!("failed to archive session: {e}");
        }
    }
}
