use crate::automation::detection::MatchEngine;
use crate::automation::idle::IdleTracker;
use crate::automation::interaction::{BasicInput, PreciseInput, INPUT_STEP_DELAY};
use crate::automation::templates::TemplateStore;
use crate::core::keys::Key;
use crate::core::screen_capture::ScreenCapture;
use crate::core::worker::StopSignal;
use crate::logging::StatusLog;
use crate::settings::AppSettings;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Opens capture and input devices. Called on the worker thread, so the
/// devices themselves need not be `Send`.
pub trait DeviceFactory: Send + Sync {
    fn capture(&self) -> Box<dyn ScreenCapture>;

    /// `None` when the low-level input method is unavailable.
    fn precise_input(&self) -> Option<Box<dyn PreciseInput>>;

    /// `None` when the generic input library cannot be initialized.
    fn basic_input(&self) -> Option<Box<dyn BasicInput>>;
}

/// User-adjustable loop behaviour, read once per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOptions {
    pub idle_threshold_minutes: String,
    pub escalation_enabled: bool,
    pub escalation_hold: Duration,
    pub secondary_enabled: bool,
    pub kick_key: Key,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self::from(&AppSettings::default())
    }
}

impl From<&AppSettings> for LoopOptions {
    fn from(settings: &AppSettings) -> Self {
        Self {
            idle_threshold_minutes: settings.idle_threshold_minutes.clone(),
            escalation_enabled: settings.escalation_enabled,
            escalation_hold: settings.escalation_hold(),
            secondary_enabled: settings.secondary_enabled,
            kick_key: settings.kick_key,
        }
    }
}

/// Fixed pauses of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTimings {
    /// After every click, before the next action
    pub settle: Duration,
    /// Between cycles
    pub inter_cycle: Duration,
    /// After a failed cycle
    pub error_backoff: Duration,
    /// Between the low-level steps of one click or key press
    pub input_step: Duration,
}

impl Default for CycleTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            inter_cycle: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            input_step: INPUT_STEP_DELAY,
        }
    }
}

/// State shared between the supervisor and the running loop.
#[derive(Clone)]
pub struct SharedState {
    pub templates: Arc<TemplateStore>,
    pub options: Arc<Mutex<LoopOptions>>,
    pub idle: Arc<Mutex<IdleTracker>>,
    pub status: StatusLog,
}

impl SharedState {
    pub fn new(templates: Arc<TemplateStore>, options: LoopOptions, status: StatusLog) -> Self {
        Self {
            templates,
            options: Arc::new(Mutex::new(options)),
            idle: Arc::new(Mutex::new(IdleTracker::default())),
            status,
        }
    }

    pub fn options(&self) -> MutexGuard<'_, LoopOptions> {
        self.options.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn idle(&self) -> MutexGuard<'_, IdleTracker> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything one loop run needs, handed to the worker thread.
pub struct LoopContext {
    pub shared: SharedState,
    pub matcher: Arc<dyn MatchEngine>,
    pub timings: CycleTimings,
    pub signal: Arc<StopSignal>,
}
