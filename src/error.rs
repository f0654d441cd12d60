use std::path::PathBuf;
use thiserror::Error;

/// Screen capture could not produce a frame this cycle.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture is not available on this platform")]
    Unavailable,

    #[error("display is not accessible: {0}")]
    Display(String),

    #[error("captured frame has invalid size {width}x{height}")]
    InvalidFrame { width: i32, height: i32 },
}

/// An input tier could not deliver an event.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("no input method available")]
    Unavailable,

    #[error("{tier} input does not support {operation}")]
    Unsupported {
        tier: &'static str,
        operation: &'static str,
    },

    #[error("{tier} input failed: {message}")]
    Injection { tier: &'static str, message: String },
}

impl InputError {
    pub fn injection(tier: &'static str, message: impl Into<String>) -> Self {
        Self::Injection {
            tier,
            message: message.into(),
        }
    }
}

/// Idle threshold text that is not a usable number of minutes.
#[derive(Debug, Error, PartialEq)]
pub enum ThresholdError {
    #[error("'{0}' is not a number of minutes")]
    NotANumber(String),

    #[error("idle threshold must be a finite, non-negative number of minutes (got {0})")]
    OutOfRange(f64),
}

/// Failure while loading or managing a template file.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unsupported template file '{0}' (expected .png, .jpg or .bmp)")]
    UnsupportedExtension(PathBuf),

    #[error("invalid template identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("failed to decode '{path}': {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TemplateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Reasons `start()` refuses to spawn the loop.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("add at least one template before starting")]
    NoPrimaryTemplates,

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write settings file: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("hotkey manager unavailable: {0}")]
    Manager(String),

    #[error("failed to register {label}: {message}")]
    Register { label: String, message: String },
}
