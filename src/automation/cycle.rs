use crate::automation::context::{DeviceFactory, LoopContext};
use crate::automation::detection::{meets_threshold, MatchResult, PRIMARY_THRESHOLD, SECONDARY_THRESHOLD};
use crate::automation::interaction::ActionExecutor;
use crate::core::screen_capture::ScreenCapture;
use crate::error::CaptureError;
use image::GrayImage;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// What one cycle did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    /// Primary targets clicked, in click order
    pub clicked: Vec<MatchResult>,
    /// Secondary target that triggered the kick key
    pub kicked: Option<MatchResult>,
    pub escalated: bool,
}

impl CycleReport {
    /// A target was acted on. Escalation does not count.
    pub fn is_productive(&self) -> bool {
        !self.clicked.is_empty() || self.kicked.is_some()
    }
}

/// Primary targets are clicked in identifier order, whatever order the
/// matcher produced them in.
pub fn click_order(mut targets: Vec<MatchResult>) -> Vec<MatchResult> {
    targets.sort_by(|a, b| a.id.cmp(&b.id));
    targets
}

/// The capture → match → act state machine.
pub struct AutomationLoop {
    ctx: LoopContext,
    capture: Box<dyn ScreenCapture>,
    executor: ActionExecutor,
}

impl AutomationLoop {
    pub fn new(ctx: LoopContext, capture: Box<dyn ScreenCapture>, executor: ActionExecutor) -> Self {
        Self {
            ctx,
            capture,
            executor,
        }
    }

    /// Open devices through `devices` on the calling thread.
    pub fn open(ctx: LoopContext, devices: &dyn DeviceFactory) -> Self {
        let executor = ActionExecutor::new(devices.precise_input(), devices.basic_input())
            .with_step_delay(ctx.timings.input_step);
        let capture = devices.capture();
        Self::new(ctx, capture, executor)
    }

    fn stopping(&self) -> bool {
        self.ctx.signal.is_stopped()
    }

    fn touch_idle_clock(&self) {
        self.ctx.shared.idle().touch(Instant::now());
    }

    /// Stops early, with whatever was found so far, once stop is requested.
    fn primary_matches(&self, screen: &GrayImage) -> Vec<MatchResult> {
        let snapshot = self.ctx.shared.templates.primary.snapshot();
        let mut found = Vec::new();
        for pattern in snapshot.values() {
            if self.stopping() {
                break;
            }
            if let Some(located) = self.ctx.matcher.locate(screen, pattern) {
                if meets_threshold(located.confidence, PRIMARY_THRESHOLD) {
                    found.push(MatchResult::new(pattern, located));
                }
            }
        }
        found
    }

    /// Run one cycle. A capture failure leaves the idle clock untouched.
    pub fn run_cycle(&mut self) -> Result<CycleReport, CaptureError> {
        let screen = self.capture.capture()?;
        let options = self.ctx.shared.options().clone();
        let status = self.ctx.shared.status.clone();
        let mut report = CycleReport::default();

        for target in click_order(self.primary_matches(&screen)) {
            if self.stopping() {
                return Ok(report);
            }
            let (x, y) = target.center;
            if let Err(e) = self.executor.click(x as i32, y as i32) {
                status.warn(&format!("Click on {} failed: {}", target.id, e));
            }
            self.touch_idle_clock();
            status.info(&format!(
                "Clicked {} @({}, {}) conf={:.2}",
                target.id, x, y, target.confidence
            ));
            report.clicked.push(target);

            if self.ctx.signal.sleep(self.ctx.timings.settle) {
                return Ok(report);
            }
        }

        if options.secondary_enabled {
            let snapshot = self.ctx.shared.templates.secondary.snapshot();
            for pattern in snapshot.values() {
                if self.stopping() {
                    return Ok(report);
                }
                let Some(located) = self.ctx.matcher.locate(&screen, pattern) else {
                    continue;
                };
                if !meets_threshold(located.confidence, SECONDARY_THRESHOLD) {
                    continue;
                }

                let target = MatchResult::new(pattern, located);
                status.info(&format!(
                    "Kick template {} detected (conf={:.2}), pressing {}",
                    target.id, target.confidence, options.kick_key
                ));
                if let Err(e) = self.executor.press_key(options.kick_key) {
                    status.warn(&format!("Pressing {} failed: {}", options.kick_key, e));
                }
                self.touch_idle_clock();
                report.kicked = Some(target);
                break;
            }
        }

        if self.stopping() {
            return Ok(report);
        }

        if !report.is_productive() && options.escalation_enabled {
            let idle = self.ctx.shared.idle().is_idle(Instant::now());
            if idle {
                if let Err(e) = self.executor.press_and_hold_left(options.escalation_hold) {
                    status.warn(&format!("Escalation action failed: {}", e));
                }
                self.touch_idle_clock();
                report.escalated = true;
                status.info(&format!(
                    "No target for too long, escalation action: held left button {:.1}s",
                    options.escalation_hold.as_secs_f32()
                ));
            }
        }

        Ok(report)
    }

    /// Repeat cycles until the stop signal is raised. Never returns on a cycle error.
    pub fn run(mut self) {
        let timings = self.ctx.timings;
        let status = self.ctx.shared.status.clone();

        while !self.stopping() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle()));
            let pause = match outcome {
                Ok(Ok(report)) => {
                    tracing::debug!(
                        clicked = report.clicked.len(),
                        kicked = report.kicked.is_some(),
                        escalated = report.escalated,
                        "cycle finished"
                    );
                    timings.inter_cycle
                }
                Ok(Err(e)) => {
                    status.warn(&format!(
                        "Screen capture failed: {}; retrying in {}s",
                        e,
                        timings.error_backoff.as_secs_f32()
                    ));
                    timings.error_backoff
                }
                Err(payload) => {
                    status.error(&format!("Error in loop: {}", panic_message(payload.as_ref())));
                    timings.error_backoff
                }
            };

            if self.ctx.signal.sleep(pause) {
                break;
            }
        }

        tracing::debug!("automation loop exited");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::context::{CycleTimings, LoopOptions, SharedState};
    use crate::automation::detection::{Located, MatchEngine};
    use crate::automation::idle::IdleTracker;
    use crate::automation::interaction::{BasicInput, PreciseInput};
    use crate::automation::templates::{Pattern, TemplateStore};
    use crate::core::keys::Key;
    use crate::core::worker::StopSignal;
    use crate::error::InputError;
    use crate::logging::StatusLog;
    use image::Luma;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Click(i32, i32),
        Key(Key),
        Hold,
    }

    type Actions = Arc<Mutex<Vec<Action>>>;

    struct Recorder(Actions);

    impl BasicInput for Recorder {
        fn move_and_click(&mut self, x: i32, y: i32) -> Result<(), InputError> {
            self.0.lock().unwrap().push(Action::Click(x, y));
            Ok(())
        }

        fn press_key(&mut self, key: Key) -> Result<(), InputError> {
            self.0.lock().unwrap().push(Action::Key(key));
            Ok(())
        }

        fn hold_left(&mut self, _duration: Duration) -> Result<(), InputError> {
            self.0.lock().unwrap().push(Action::Hold);
            Ok(())
        }
    }

    struct BrokenPrecise;

    impl PreciseInput for BrokenPrecise {
        fn move_cursor(&mut self, _x: i32, _y: i32) -> Result<(), InputError> {
            Err(InputError::Unavailable)
        }
        fn left_button(&mut self, _down: bool) -> Result<(), InputError> {
            Err(InputError::Unavailable)
        }
        fn key(&mut self, _key: Key, _down: bool) -> Result<(), InputError> {
            Err(InputError::Unavailable)
        }
    }

    struct StaticCapture {
        fail: bool,
    }

    impl ScreenCapture for StaticCapture {
        fn capture(&mut self) -> Result<GrayImage, CaptureError> {
            if self.fail {
                Err(CaptureError::Display("locked".to_string()))
            } else {
                Ok(GrayImage::new(100, 100))
            }
        }
    }

    /// Scripted confidences by pattern id.
    struct ScriptedMatcher(HashMap<String, (f32, (u32, u32))>);

    impl MatchEngine for ScriptedMatcher {
        fn locate(&self, _screen: &GrayImage, pattern: &Pattern) -> Option<Located> {
            self.0.get(pattern.id()).map(|&(confidence, top_left)| Located { confidence, top_left })
        }
    }

    struct Fixture {
        _primary: TempDir,
        _secondary: TempDir,
        shared: SharedState,
        actions: Actions,
        signal: Arc<StopSignal>,
    }

    fn fixture(primary: &[&str], secondary: &[&str], options: LoopOptions) -> Fixture {
        let primary_dir = TempDir::new().unwrap();
        let secondary_dir = TempDir::new().unwrap();
        for name in primary {
            GrayImage::from_pixel(4, 2, Luma([9])).save(primary_dir.path().join(name)).unwrap();
        }
        for name in secondary {
            GrayImage::from_pixel(4, 2, Luma([9])).save(secondary_dir.path().join(name)).unwrap();
        }
        let store = TemplateStore::new(primary_dir.path(), secondary_dir.path());
        store.primary.reload().unwrap();
        store.secondary.reload().unwrap();

        Fixture {
            _primary: primary_dir,
            _secondary: secondary_dir,
            shared: SharedState::new(Arc::new(store), options, StatusLog::default()),
            actions: Actions::default(),
            signal: Arc::new(StopSignal::new()),
        }
    }

    fn fast_timings() -> CycleTimings {
        CycleTimings {
            settle: Duration::from_millis(1),
            inter_cycle: Duration::from_millis(5),
            error_backoff: Duration::from_millis(5),
            input_step: Duration::ZERO,
        }
    }

    fn build_loop(f: &Fixture, scores: &[(&str, f32)], capture_fails: bool) -> AutomationLoop {
        let matcher = ScriptedMatcher(
            scores
                .iter()
                .map(|(id, c)| (id.to_string(), (*c, (10, 20))))
                .collect(),
        );
        let ctx = LoopContext {
            shared: f.shared.clone(),
            matcher: Arc::new(matcher),
            timings: fast_timings(),
            signal: Arc::clone(&f.signal),
        };
        let executor = ActionExecutor::new(
            Some(Box::new(BrokenPrecise)),
            Some(Box::new(Recorder(Arc::clone(&f.actions)))),
        )
        .with_step_delay(Duration::ZERO);
        AutomationLoop::new(ctx, Box::new(StaticCapture { fail: capture_fails }), executor)
    }

    fn quiet_options() -> LoopOptions {
        LoopOptions {
            escalation_enabled: false,
            secondary_enabled: false,
            escalation_hold: Duration::ZERO,
            ..LoopOptions::default()
        }
    }

    fn make_idle(shared: &SharedState) {
        let long_ago = Instant::now() - Duration::from_secs(60);
        shared.idle().reset(long_ago, Duration::from_secs(1));
    }

    #[test]
    fn clicks_in_identifier_order() {
        let f = fixture(&["b.png", "a.png"], &[], quiet_options());
        let mut automation = build_loop(&f, &[("b.png", 0.9), ("a.png", 0.85)], false);

        let report = automation.run_cycle().unwrap();
        let order: Vec<_> = report.clicked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(order, vec!["a.png", "b.png"]);
        // 4x2 pattern at (10, 20) → center (12, 21)
        assert_eq!(
            *f.actions.lock().unwrap(),
            vec![Action::Click(12, 21), Action::Click(12, 21)]
        );
    }

    #[test]
    fn click_order_sorts_matcher_output() {
        let found = |id: &str, confidence: f32| MatchResult {
            id: id.to_string(),
            top_left: (0, 0),
            confidence,
            center: (2, 1),
        };
        let ordered = click_order(vec![found("b.png", 0.9), found("a.png", 0.85)]);
        let ids: Vec<_> = ordered.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a.png", "b.png"]);
    }

    /// Requests stop from inside the first locate call.
    struct StoppingMatcher {
        signal: Arc<StopSignal>,
        calls: Mutex<usize>,
    }

    impl MatchEngine for StoppingMatcher {
        fn locate(&self, _screen: &GrayImage, _pattern: &Pattern) -> Option<Located> {
            *self.calls.lock().unwrap() += 1;
            self.signal.stop();
            Some(Located {
                confidence: 0.99,
                top_left: (0, 0),
            })
        }
    }

    #[test]
    fn stop_interrupts_primary_matching() {
        let f = fixture(&["a.png", "b.png", "c.png"], &[], quiet_options());
        let matcher = Arc::new(StoppingMatcher {
            signal: Arc::clone(&f.signal),
            calls: Mutex::new(0),
        });
        let ctx = LoopContext {
            shared: f.shared.clone(),
            matcher: Arc::clone(&matcher) as Arc<dyn MatchEngine>,
            timings: fast_timings(),
            signal: Arc::clone(&f.signal),
        };
        let executor = ActionExecutor::new(None, Some(Box::new(Recorder(Arc::clone(&f.actions)))))
            .with_step_delay(Duration::ZERO);
        let mut automation = AutomationLoop::new(ctx, Box::new(StaticCapture { fail: false }), executor);

        let report = automation.run_cycle().unwrap();
        assert_eq!(*matcher.calls.lock().unwrap(), 1);
        assert!(report.clicked.is_empty());
        assert!(f.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn primary_threshold_is_inclusive() {
        let f = fixture(&["edge.png", "low.png"], &[], quiet_options());
        let mut automation = build_loop(&f, &[("edge.png", 0.80), ("low.png", 0.79)], false);

        let report = automation.run_cycle().unwrap();
        assert_eq!(report.clicked.len(), 1);
        assert_eq!(report.clicked[0].id, "edge.png");
    }

    #[test]
    fn click_touches_idle_clock() {
        let f = fixture(&["a.png"], &[], quiet_options());
        make_idle(&f.shared);
        let before = f.shared.idle().last_action();
        let mut automation = build_loop(&f, &[("a.png", 0.95)], false);

        automation.run_cycle().unwrap();
        assert!(f.shared.idle().last_action() > before);
    }

    #[test]
    fn secondary_fires_at_most_once_per_cycle() {
        let options = LoopOptions {
            secondary_enabled: true,
            ..quiet_options()
        };
        let f = fixture(&["a.png"], &["k1.png", "k2.png"], options);
        let mut automation = build_loop(&f, &[("k1.png", 0.99), ("k2.png", 0.99)], false);

        let report = automation.run_cycle().unwrap();
        assert!(report.kicked.is_some());
        assert!(report.is_productive());
        assert_eq!(*f.actions.lock().unwrap(), vec![Action::Key(Key::F11)]);
    }

    #[test]
    fn secondary_threshold_is_stricter_and_inclusive() {
        let options = LoopOptions {
            secondary_enabled: true,
            ..quiet_options()
        };
        let f = fixture(&["a.png"], &["k.png"], options);

        let mut below = build_loop(&f, &[("k.png", 0.84)], false);
        assert!(below.run_cycle().unwrap().kicked.is_none());

        let mut edge = build_loop(&f, &[("k.png", 0.85)], false);
        assert!(edge.run_cycle().unwrap().kicked.is_some());
    }

    #[test]
    fn secondary_disabled_never_presses() {
        let f = fixture(&["a.png"], &["k.png"], quiet_options());
        let mut automation = build_loop(&f, &[("k.png", 1.0)], false);
        assert!(automation.run_cycle().unwrap().kicked.is_none());
        assert!(f.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn escalates_when_idle_and_unproductive() {
        let options = LoopOptions {
            escalation_enabled: true,
            ..quiet_options()
        };
        let f = fixture(&["a.png"], &[], options);
        make_idle(&f.shared);
        let mut automation = build_loop(&f, &[], false);

        let report = automation.run_cycle().unwrap();
        assert!(report.escalated);
        assert_eq!(*f.actions.lock().unwrap(), vec![Action::Hold]);

        // Clock was reset, so the next cycle stays quiet.
        let report = automation.run_cycle().unwrap();
        assert!(!report.escalated);
        assert_eq!(f.actions.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_escalation_when_disabled() {
        let f = fixture(&["a.png"], &[], quiet_options());
        make_idle(&f.shared);
        let mut automation = build_loop(&f, &[], false);

        assert!(!automation.run_cycle().unwrap().escalated);
        assert!(f.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn no_escalation_in_productive_cycle() {
        let options = LoopOptions {
            escalation_enabled: true,
            ..quiet_options()
        };
        let f = fixture(&["a.png"], &[], options);
        make_idle(&f.shared);
        let mut automation = build_loop(&f, &[("a.png", 0.9)], false);

        let report = automation.run_cycle().unwrap();
        assert!(!report.escalated);
        assert_eq!(*f.actions.lock().unwrap(), vec![Action::Click(12, 21)]);
    }

    #[test]
    fn capture_failure_leaves_idle_clock_alone() {
        let options = LoopOptions {
            escalation_enabled: true,
            ..quiet_options()
        };
        let f = fixture(&["a.png"], &[], options);
        make_idle(&f.shared);
        let before: IdleTracker = *f.shared.idle();
        let mut automation = build_loop(&f, &[("a.png", 0.9)], true);

        assert!(automation.run_cycle().is_err());
        assert_eq!(f.shared.idle().last_action(), before.last_action());
        assert!(f.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_before_clicks_skips_actions() {
        let f = fixture(&["a.png", "b.png"], &[], quiet_options());
        let mut automation = build_loop(&f, &[("a.png", 0.9), ("b.png", 0.9)], false);
        f.signal.stop();

        let report = automation.run_cycle().unwrap();
        assert!(report.clicked.is_empty());
        assert!(f.actions.lock().unwrap().is_empty());
    }

    #[test]
    fn run_survives_capture_failures_until_stopped() {
        let f = fixture(&["a.png"], &[], quiet_options());
        let automation = build_loop(&f, &[], true);
        let signal = Arc::clone(&f.signal);

        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(40));
            signal.stop();
        });

        let started = Instant::now();
        automation.run();
        assert!(started.elapsed() >= Duration::from_millis(40));
        stopper.join().unwrap();
        assert!(f
            .shared
            .status
            .snapshot()
            .iter()
            .any(|line| line.contains("Screen capture failed")));
    }

    #[test]
    fn template_removed_mid_run_is_not_clicked() {
        let f = fixture(&["a.png", "b.png"], &[], quiet_options());
        let mut automation = build_loop(&f, &[("a.png", 0.9), ("b.png", 0.9)], false);

        fs::remove_file(f.shared.templates.primary.dir().join("a.png")).unwrap();
        f.shared.templates.primary.reload().unwrap();

        let report = automation.run_cycle().unwrap();
        let ids: Vec<_> = report.clicked.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["b.png"]);
    }
}
