use crate::error::ThresholdError;
use std::time::{Duration, Instant};

pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(900);

/// Parse a user-entered number of minutes into an idle threshold.
pub fn parse_idle_threshold(minutes: &str) -> Result<Duration, ThresholdError> {
    let trimmed = minutes.trim();
    let value: f64 = trimmed
        .parse()
        .map_err(|_| ThresholdError::NotANumber(trimmed.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ThresholdError::OutOfRange(value));
    }
    Duration::try_from_secs_f64(value * 60.0).map_err(|_| ThresholdError::OutOfRange(value))
}

/// Time of the last meaningful action and how long the loop may stay quiet.
#[derive(Debug, Clone, Copy)]
pub struct IdleTracker {
    last_action: Instant,
    threshold: Duration,
}

impl IdleTracker {
    pub fn new(now: Instant, threshold: Duration) -> Self {
        Self {
            last_action: now,
            threshold,
        }
    }

    /// Restart the clock with a freshly derived threshold
    pub fn reset(&mut self, now: Instant, threshold: Duration) {
        self.last_action = now;
        self.threshold = threshold;
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_action = now;
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_action) > self.threshold
    }

    pub fn last_action(&self) -> Instant {
        self.last_action
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }
}

impl Default for IdleTracker {
    fn default() -> Self {
        Self::new(Instant::now(), DEFAULT_IDLE_THRESHOLD)
    }
}
