use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "afk-sentinel.log";

/// Install the global tracing subscriber.
///
/// Writes plain text to `<log_dir>/afk-sentinel.log`; `verbose` also mirrors to
/// the console. `RUST_LOG` overrides the default level. Keep the returned guard
/// alive for the lifetime of the process.
pub fn init_tracing(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true);

    let console_layer = verbose.then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("tracing subscriber already installed")?;

    tracing::info!(dir = %log_dir.display(), verbose, "logging initialized");
    Ok(guard)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

struct StatusLogInner {
    enabled: bool,
    capacity: usize,
    lines: VecDeque<String>,
}

/// Human-readable status stream shown in the log panel.
///
/// Lines are `HH:MM:SS - message`. When disabled, nothing is appended but every
/// message still reaches `tracing`.
#[derive(Clone)]
pub struct StatusLog {
    inner: Arc<Mutex<StatusLogInner>>,
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }
}

impl StatusLog {
    pub const DEFAULT_CAPACITY: usize = 500;

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StatusLogInner {
                enabled: true,
                capacity: capacity.max(1),
                lines: VecDeque::new(),
            })),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    pub fn push(&self, level: Level, message: &str) {
        match level {
            Level::Info => tracing::info!(target: "status", "{}", message),
            Level::Warn => tracing::warn!(target: "status", "{}", message),
            Level::Error => tracing::error!(target: "status", "{}", message),
        }

        let mut inner = self.lock();
        if !inner.enabled {
            return;
        }
        let line = format!("{} - {}", Local::now().format("%H:%M:%S"), message);
        inner.lines.push_back(line);
        while inner.lines.len() > inner.capacity {
            inner.lines.pop_front();
        }
    }

    pub fn info(&self, message: &str) {
        self.push(Level::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    pub fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lock().lines.iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().lines.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusLogInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
