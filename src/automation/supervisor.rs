use crate::automation::context::{CycleTimings, DeviceFactory, LoopContext, LoopOptions, SharedState};
use crate::automation::cycle::AutomationLoop;
use crate::automation::detection::{MatchEngine, NccMatchEngine};
use crate::automation::idle::{parse_idle_threshold, IdleTracker, DEFAULT_IDLE_THRESHOLD};
use crate::automation::templates::{TemplateCollection, TemplateStore};
use crate::core::keys::Key;
use crate::core::worker::{JoinOutcome, Worker};
use crate::error::{StartError, TemplateError};
use crate::logging::StatusLog;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A loop is already running or still stopping
    AlreadyActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    Joined,
    /// The thread did not exit in time and was detached
    Abandoned,
}

struct Control {
    state: LoopState,
    worker: Option<Worker>,
}

/// Owns the loop lifecycle and the control surface the UI and hotkeys call.
pub struct Supervisor {
    shared: SharedState,
    devices: Arc<dyn DeviceFactory>,
    matcher: Arc<dyn MatchEngine>,
    timings: CycleTimings,
    stop_timeout: Duration,
    control: Mutex<Control>,
}

impl Supervisor {
    pub fn new(
        templates: Arc<TemplateStore>,
        devices: Arc<dyn DeviceFactory>,
        options: LoopOptions,
        status: StatusLog,
    ) -> Self {
        Self {
            shared: SharedState::new(templates, options, status),
            devices,
            matcher: Arc::new(NccMatchEngine),
            timings: CycleTimings::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            control: Mutex::new(Control {
                state: LoopState::Idle,
                worker: None,
            }),
        }
    }

    pub fn with_matcher(mut self, matcher: Arc<dyn MatchEngine>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_timings(mut self, timings: CycleTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LoopState {
        let mut control = self.control();
        // A loop thread that died on its own leaves nothing to stop.
        if control.state == LoopState::Running
            && control.worker.as_ref().map_or(true, Worker::is_finished)
        {
            control.state = LoopState::Idle;
            control.worker = None;
        }
        control.state
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    pub fn start(&self) -> Result<StartOutcome, StartError> {
        let mut control = self.control();
        if control.state != LoopState::Idle {
            return Ok(StartOutcome::AlreadyActive);
        }

        if self.shared.templates.primary.is_empty() {
            self.shared
                .status
                .warn("No click templates loaded; add at least one before starting");
            return Err(StartError::NoPrimaryTemplates);
        }

        let minutes = self.shared.options().idle_threshold_minutes.clone();
        let threshold = match parse_idle_threshold(&minutes) {
            Ok(threshold) => threshold,
            Err(e) => {
                self.shared.status.warn(&format!(
                    "Invalid idle minutes ({}), using default {} minutes",
                    e,
                    DEFAULT_IDLE_THRESHOLD.as_secs() / 60
                ));
                DEFAULT_IDLE_THRESHOLD
            }
        };
        self.shared.idle().reset(Instant::now(), threshold);

        let shared = self.shared.clone();
        let devices = Arc::clone(&self.devices);
        let matcher = Arc::clone(&self.matcher);
        let timings = self.timings;
        let worker = Worker::spawn("automation-loop", move |signal| {
            let ctx = LoopContext {
                shared,
                matcher,
                timings,
                signal,
            };
            AutomationLoop::open(ctx, devices.as_ref()).run();
        })
        .map_err(StartError::Spawn)?;

        control.worker = Some(worker);
        control.state = LoopState::Running;
        drop(control);

        tracing::info!(threshold_secs = threshold.as_secs_f64(), "automation loop started");
        self.shared.status.info(&format!(
            "Automation started (idle threshold {:.1}s)",
            threshold.as_secs_f64()
        ));
        Ok(StartOutcome::Started)
    }

    /// Blocks for at most the stop timeout.
    pub fn stop(&self) -> StopOutcome {
        let worker = {
            let mut control = self.control();
            if control.state != LoopState::Running {
                return StopOutcome::NotRunning;
            }
            control.state = LoopState::Stopping;
            control.worker.take()
        };

        let outcome = match worker {
            Some(worker) => match worker.stop(self.stop_timeout) {
                JoinOutcome::Joined => StopOutcome::Joined,
                JoinOutcome::Abandoned => StopOutcome::Abandoned,
            },
            None => StopOutcome::Joined,
        };

        self.control().state = LoopState::Idle;

        match outcome {
            StopOutcome::Abandoned => self
                .shared
                .status
                .warn("Automation loop did not stop in time; detached"),
            _ => self.shared.status.info("Automation stopped"),
        }
        outcome
    }

    fn add_to(&self, collection: &TemplateCollection, label: &str, source: &Path) -> Result<String, TemplateError> {
        match collection.add(source) {
            Ok(id) => {
                self.shared
                    .status
                    .info(&format!("Added {} template {}", label, id));
                Ok(id)
            }
            Err(e) => {
                self.shared
                    .status
                    .warn(&format!("Could not add {} template: {}", label, e));
                Err(e)
            }
        }
    }

    fn remove_from(&self, collection: &TemplateCollection, label: &str, id: &str) -> Result<bool, TemplateError> {
        match collection.remove(id) {
            Ok(removed) => {
                if removed {
                    self.shared
                        .status
                        .info(&format!("Removed {} template {}", label, id));
                }
                Ok(removed)
            }
            Err(e) => {
                self.shared
                    .status
                    .warn(&format!("Could not remove {} template {}: {}", label, id, e));
                Err(e)
            }
        }
    }

    fn reload(&self, collection: &TemplateCollection, label: &str) -> usize {
        match collection.reload() {
            Ok(summary) => {
                for (name, e) in &summary.skipped {
                    self.shared
                        .status
                        .warn(&format!("Skipped {} template {}: {}", label, name, e));
                }
                self.shared.status.info(&format!(
                    "Loaded {} {} template(s) from {}",
                    summary.loaded,
                    label,
                    collection.dir().display()
                ));
                summary.loaded
            }
            Err(e) => {
                self.shared
                    .status
                    .error(&format!("Could not load {} templates: {}", label, e));
                collection.len()
            }
        }
    }

    pub fn add_primary(&self, source: &Path) -> Result<String, TemplateError> {
        self.add_to(&self.shared.templates.primary, "click", source)
    }

    pub fn remove_primary(&self, id: &str) -> Result<bool, TemplateError> {
        self.remove_from(&self.shared.templates.primary, "click", id)
    }

    /// Returns the number of loaded patterns.
    pub fn reload_primary(&self) -> usize {
        self.reload(&self.shared.templates.primary, "click")
    }

    pub fn add_secondary(&self, source: &Path) -> Result<String, TemplateError> {
        self.add_to(&self.shared.templates.secondary, "kick", source)
    }

    pub fn remove_secondary(&self, id: &str) -> Result<bool, TemplateError> {
        self.remove_from(&self.shared.templates.secondary, "kick", id)
    }

    pub fn reload_secondary(&self) -> usize {
        self.reload(&self.shared.templates.secondary, "kick")
    }

    pub fn primary_ids(&self) -> Vec<String> {
        self.shared.templates.primary.ids()
    }

    pub fn secondary_ids(&self) -> Vec<String> {
        self.shared.templates.secondary.ids()
    }

    /// Takes effect on the next `start()`.
    pub fn set_idle_threshold_minutes(&self, minutes: String) {
        self.shared.options().idle_threshold_minutes = minutes;
    }

    pub fn set_escalation_enabled(&self, enabled: bool) {
        self.shared.options().escalation_enabled = enabled;
    }

    pub fn set_escalation_hold(&self, hold: Duration) {
        self.shared.options().escalation_hold = hold;
    }

    pub fn set_secondary_enabled(&self, enabled: bool) {
        self.shared.options().secondary_enabled = enabled;
    }

    pub fn set_kick_key(&self, key: Key) {
        self.shared.options().kick_key = key;
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.shared.status.set_enabled(enabled);
    }

    pub fn options(&self) -> LoopOptions {
        self.shared.options().clone()
    }

    pub fn idle_snapshot(&self) -> IdleTracker {
        *self.shared.idle()
    }

    pub fn status(&self) -> &StatusLog {
        &self.shared.status
    }

    pub fn status_lines(&self) -> Vec<String> {
        self.shared.status.snapshot()
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let control = self.control.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(worker) = control.worker.as_ref() {
            worker.signal().stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::interaction::{BasicInput, PreciseInput};
    use crate::core::screen_capture::{ScreenCapture, UnavailableCapture};
    use image::{GrayImage, Luma};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingDevices {
        opened: AtomicUsize,
    }

    impl DeviceFactory for CountingDevices {
        fn capture(&self) -> Box<dyn ScreenCapture> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Box::new(UnavailableCapture)
        }

        fn precise_input(&self) -> Option<Box<dyn PreciseInput>> {
            None
        }

        fn basic_input(&self) -> Option<Box<dyn BasicInput>> {
            None
        }
    }

    fn timings() -> CycleTimings {
        CycleTimings {
            settle: Duration::from_millis(1),
            inter_cycle: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
            input_step: Duration::ZERO,
        }
    }

    fn supervisor(with_template: bool) -> (TempDir, Arc<CountingDevices>, Supervisor) {
        let dir = TempDir::new().unwrap();
        let primary = dir.path().join("templates");
        let secondary = dir.path().join("kick_templates");
        std::fs::create_dir_all(&primary).unwrap();
        if with_template {
            GrayImage::from_pixel(3, 3, Luma([1])).save(primary.join("a.png")).unwrap();
        }
        let store = TemplateStore::new(primary, secondary);
        store.primary.reload().unwrap();

        let devices = Arc::new(CountingDevices::default());
        let sup = Supervisor::new(
            Arc::new(store),
            Arc::clone(&devices) as Arc<dyn DeviceFactory>,
            LoopOptions::default(),
            StatusLog::default(),
        )
        .with_timings(timings());
        (dir, devices, sup)
    }

    #[test]
    fn start_requires_primary_templates() {
        let (_dir, devices, sup) = supervisor(false);
        assert!(matches!(sup.start(), Err(StartError::NoPrimaryTemplates)));
        assert_eq!(sup.state(), LoopState::Idle);
        assert_eq!(devices.opened.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_then_stop() {
        let (_dir, _devices, sup) = supervisor(true);
        assert_eq!(sup.start().unwrap(), StartOutcome::Started);
        assert!(sup.is_running());
        assert_eq!(sup.stop(), StopOutcome::Joined);
        assert_eq!(sup.state(), LoopState::Idle);
    }

    #[test]
    fn second_start_is_a_no_op() {
        let (_dir, devices, sup) = supervisor(true);
        assert_eq!(sup.start().unwrap(), StartOutcome::Started);
        assert_eq!(sup.start().unwrap(), StartOutcome::AlreadyActive);
        std::thread::sleep(Duration::from_millis(30));
        sup.stop();
        assert_eq!(devices.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_when_idle_does_nothing() {
        let (_dir, _devices, sup) = supervisor(true);
        assert_eq!(sup.stop(), StopOutcome::NotRunning);
    }

    #[test]
    fn invalid_idle_minutes_fall_back_with_warning() {
        let (_dir, _devices, sup) = supervisor(true);
        sup.set_idle_threshold_minutes("abc".to_string());
        sup.start().unwrap();
        sup.stop();

        assert_eq!(sup.idle_snapshot().threshold(), DEFAULT_IDLE_THRESHOLD);
        assert!(sup
            .status_lines()
            .iter()
            .any(|line| line.contains("Invalid idle minutes")));
    }

    #[test]
    fn start_applies_parsed_threshold() {
        let (_dir, _devices, sup) = supervisor(true);
        sup.set_idle_threshold_minutes("0.3".to_string());
        sup.start().unwrap();
        sup.stop();
        assert_eq!(sup.idle_snapshot().threshold(), Duration::from_secs(18));
    }

    #[test]
    fn logging_flag_gates_status_lines() {
        let (_dir, _devices, sup) = supervisor(true);
        sup.set_logging_enabled(false);
        sup.reload_primary();
        assert!(sup.status_lines().is_empty());

        sup.set_logging_enabled(true);
        sup.reload_primary();
        assert_eq!(sup.status_lines().len(), 1);
    }
}
