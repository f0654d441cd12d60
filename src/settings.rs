use crate::core::keys::Key;
use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyModifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    pub key: Option<Key>,
    #[serde(default)]
    pub modifiers: HotkeyModifiers,
}

impl HotkeyConfig {
    pub fn plain(key: Key) -> Self {
        Self {
            key: Some(key),
            modifiers: HotkeyModifiers::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub primary_template_dir: PathBuf,
    pub secondary_template_dir: PathBuf,

    /// Minutes without a productive action before escalation, as typed by the user.
    pub idle_threshold_minutes: String,
    pub escalation_enabled: bool,
    pub escalation_hold_ms: u64,

    pub secondary_enabled: bool,
    pub kick_key: Key,

    pub logging_enabled: bool,
    pub always_on_top: bool,

    pub start_hotkey: HotkeyConfig,
    pub stop_hotkey: HotkeyConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            primary_template_dir: PathBuf::from("templates"),
            secondary_template_dir: PathBuf::from("kick_templates"),
            idle_threshold_minutes: "0.3".to_string(),
            escalation_enabled: true,
            escalation_hold_ms: 1000,
            secondary_enabled: true,
            kick_key: Key::F11,
            logging_enabled: true,
            always_on_top: false,
            start_hotkey: HotkeyConfig::plain(Key::F6),
            stop_hotkey: HotkeyConfig::plain(Key::F7),
        }
    }
}

impl AppSettings {
    pub const SETTINGS_FILE: &'static str = "afk_sentinel_settings.json";

    pub fn escalation_hold(&self) -> Duration {
        Duration::from_millis(self.escalation_hold_ms)
    }

    /// Load settings from the default file, or defaults if missing or corrupt
    pub fn load() -> Self {
        Self::load_from(Path::new(Self::SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<AppSettings>(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "settings file is invalid, using defaults: {}", e);
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read settings, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(Path::new(Self::SETTINGS_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Auto-save; failures are logged, not returned
    pub fn auto_save(&self) {
        if let Err(e) = self.save() {
            tracing::warn!("auto-save failed: {}", e);
        }
    }
}
