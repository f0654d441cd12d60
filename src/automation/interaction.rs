use crate::core::keys::Key;
use crate::error::InputError;
use std::thread;
use std::time::Duration;

/// Delay between the low-level steps of a click or key press.
pub const INPUT_STEP_DELAY: Duration = Duration::from_millis(50);

/// Low-level input: individual cursor, button and key events.
pub trait PreciseInput {
    fn move_cursor(&mut self, x: i32, y: i32) -> Result<(), InputError>;
    fn left_button(&mut self, down: bool) -> Result<(), InputError>;
    fn key(&mut self, key: Key, down: bool) -> Result<(), InputError>;
}

/// Coarse, library-level input used when the precise tier is missing or fails.
pub trait BasicInput {
    fn move_and_click(&mut self, x: i32, y: i32) -> Result<(), InputError>;
    fn press_key(&mut self, key: Key) -> Result<(), InputError>;

    fn hold_left(&mut self, _duration: Duration) -> Result<(), InputError> {
        Err(InputError::Unsupported {
            tier: "basic",
            operation: "press-and-hold",
        })
    }
}

/// Which tier delivered an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTier {
    Precise,
    Basic,
}

/// Clicks, key presses and holds with a fixed precise → basic fallback order.
pub struct ActionExecutor {
    precise: Option<Box<dyn PreciseInput>>,
    basic: Option<Box<dyn BasicInput>>,
    step_delay: Duration,
}

impl ActionExecutor {
    pub fn new(precise: Option<Box<dyn PreciseInput>>, basic: Option<Box<dyn BasicInput>>) -> Self {
        Self {
            precise,
            basic,
            step_delay: INPUT_STEP_DELAY,
        }
    }

    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn click(&mut self, x: i32, y: i32) -> Result<InputTier, InputError> {
        if let Some(precise) = self.precise.as_mut() {
            let step_delay = self.step_delay;
            let attempt = (|| -> Result<(), InputError> {
                precise.move_cursor(x, y)?;
                thread::sleep(step_delay);
                precise.left_button(true)?;
                thread::sleep(step_delay);
                precise.left_button(false)
            })();
            match attempt {
                Ok(()) => return Ok(InputTier::Precise),
                Err(e) => tracing::warn!("precise click at ({}, {}) failed, falling back: {}", x, y, e),
            }
        }

        let basic = self.basic.as_mut().ok_or(InputError::Unavailable)?;
        basic.move_and_click(x, y)?;
        Ok(InputTier::Basic)
    }

    pub fn press_key(&mut self, key: Key) -> Result<InputTier, InputError> {
        if let Some(precise) = self.precise.as_mut() {
            let step_delay = self.step_delay;
            let attempt = (|| -> Result<(), InputError> {
                precise.key(key, true)?;
                thread::sleep(step_delay);
                precise.key(key, false)
            })();
            match attempt {
                Ok(()) => return Ok(InputTier::Precise),
                Err(e) => tracing::warn!("precise {} press failed, falling back: {}", key, e),
            }
        }

        let basic = self.basic.as_mut().ok_or(InputError::Unavailable)?;
        basic.press_key(key)?;
        Ok(InputTier::Basic)
    }

    /// Press the left button, keep it down for `duration`, release.
    pub fn press_and_hold_left(&mut self, duration: Duration) -> Result<InputTier, InputError> {
        if let Some(precise) = self.precise.as_mut() {
            match precise.left_button(true) {
                Ok(()) => {
                    thread::sleep(duration);
                    if let Err(e) = precise.left_button(false) {
                        tracing::warn!("button release failed, retrying: {}", e);
                        thread::sleep(self.step_delay);
                        precise.left_button(false)?;
                    }
                    return Ok(InputTier::Precise);
                }
                Err(e) => tracing::warn!("precise hold failed, falling back: {}", e),
            }
        }

        let basic = self.basic.as_mut().ok_or(InputError::Unavailable)?;
        basic.hold_left(duration)?;
        Ok(InputTier::Basic)
    }
}
