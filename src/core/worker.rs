use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Cooperative cancellation flag that sleeping code can wait on.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cvar: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for `duration` unless stopped first. Returns `true` if stop was requested.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            stopped = self
                .cvar
                .wait_timeout(stopped, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// How a bounded join ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Abandoned,
}

// Sends on drop so the owner learns about exit even when the task panics.
struct ExitNotice(mpsc::Sender<()>);

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// A background thread with a stop signal and a bounded join.
pub struct Worker {
    signal: Arc<StopSignal>,
    exited: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn<F>(name: &str, task: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<StopSignal>) + Send + 'static,
    {
        let signal = Arc::new(StopSignal::new());
        let (tx, exited) = mpsc::channel();

        // Clone for the thread
        let signal_clone = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let _notice = ExitNotice(tx);
                task(signal_clone);
            })?;

        Ok(Self {
            signal,
            exited,
            handle,
        })
    }

    pub fn signal(&self) -> &Arc<StopSignal> {
        &self.signal
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Raise the stop signal and wait up to `timeout` for the thread to exit.
    /// A thread that does not exit in time is detached, never killed.
    pub fn stop(self, timeout: Duration) -> JoinOutcome {
        self.signal.stop();
        match self.exited.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = self.handle.join();
                JoinOutcome::Joined
            }
            Err(RecvTimeoutError::Timeout) => JoinOutcome::Abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn sleep_returns_early_when_stopped() {
        let signal = Arc::new(StopSignal::new());
        let remote = Arc::clone(&signal);
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.stop();
        });

        let started = Instant::now();
        assert!(signal.sleep(Duration::from_secs(5)));
        assert!(started.elapsed() < Duration::from_secs(2));
        waker.join().unwrap();
    }

    #[test]
    fn sleep_runs_full_duration_without_stop() {
        let signal = StopSignal::new();
        let started = Instant::now();
        assert!(!signal.sleep(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cooperative_task_is_joined() {
        let exited = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&exited);
        let worker = Worker::spawn("test-worker", move |signal| {
            while !signal.sleep(Duration::from_millis(5)) {}
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(worker.stop(Duration::from_secs(2)), JoinOutcome::Joined);
        assert!(exited.load(Ordering::SeqCst));
    }

    #[test]
    fn stuck_task_is_abandoned_after_timeout() {
        let worker = Worker::spawn("stuck-worker", |_signal| {
            thread::sleep(Duration::from_millis(500));
        })
        .unwrap();

        let started = Instant::now();
        assert_eq!(worker.stop(Duration::from_millis(50)), JoinOutcome::Abandoned);
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[test]
    fn panicking_task_still_reports_exit() {
        let worker = Worker::spawn("panicky-worker", |_signal| panic!("boom")).unwrap();
        assert_eq!(worker.stop(Duration::from_secs(2)), JoinOutcome::Joined);
    }
}
