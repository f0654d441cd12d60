use crate::automation::supervisor::Supervisor;
use crate::core::keys::Key;
use crate::error::{HotkeyError, StartError};
use crate::settings::{HotkeyConfig, HotkeyModifiers};
use eframe::egui;
use global_hotkey::hotkey::{HotKey, Modifiers};
use global_hotkey::{GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

pub fn hotkey_label(config: &HotkeyConfig) -> String {
    let Some(key) = config.key else {
        return "Disabled".to_string();
    };

    let mut parts: Vec<&'static str> = Vec::new();
    if config.modifiers.ctrl {
        parts.push("Ctrl");
    }
    if config.modifiers.alt {
        parts.push("Alt");
    }
    if config.modifiers.shift {
        parts.push("Shift");
    }
    if config.modifiers.meta {
        parts.push("Meta");
    }
    parts.push(key.label());
    parts.join("+")
}

pub fn hotkey_from_config(config: &HotkeyConfig) -> Option<HotKey> {
    let key = config.key?;
    let modifiers = modifiers_to_code(config.modifiers);
    if modifiers.is_empty() {
        Some(HotKey::new(None, key.code()))
    } else {
        Some(HotKey::new(Some(modifiers), key.code()))
    }
}

fn modifiers_to_code(modifiers: HotkeyModifiers) -> Modifiers {
    let mut mods = Modifiers::empty();
    if modifiers.ctrl {
        mods |= Modifiers::CONTROL;
    }
    if modifiers.alt {
        mods |= Modifiers::ALT;
    }
    if modifiers.shift {
        mods |= Modifiers::SHIFT;
    }
    if modifiers.meta {
        mods |= Modifiers::META;
    }
    mods
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    Start,
    Stop,
    /// Start and stop share one chord
    Toggle,
}

/// Registered hotkey ids and what they trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotkeyMap {
    pub start: Option<u32>,
    pub stop: Option<u32>,
}

impl HotkeyMap {
    pub fn action_for(&self, id: u32) -> Option<HotkeyAction> {
        match (self.start == Some(id), self.stop == Some(id)) {
            (true, true) => Some(HotkeyAction::Toggle),
            (true, false) => Some(HotkeyAction::Start),
            (false, true) => Some(HotkeyAction::Stop),
            (false, false) => None,
        }
    }
}

/// The hotkeys to register for a start/stop pair, each with its label,
/// and the map resolving their ids. A chord shared by both is registered once.
pub fn plan_hotkeys(start: &HotkeyConfig, stop: &HotkeyConfig) -> (Vec<(HotKey, String)>, HotkeyMap) {
    let mut hotkeys = Vec::new();
    let mut map = HotkeyMap::default();

    if let Some(hotkey) = hotkey_from_config(start) {
        hotkeys.push((hotkey, hotkey_label(start)));
        map.start = Some(hotkey.id());
    }
    if let Some(hotkey) = hotkey_from_config(stop) {
        if map.start != Some(hotkey.id()) {
            hotkeys.push((hotkey, hotkey_label(stop)));
        }
        map.stop = Some(hotkey.id());
    }
    (hotkeys, map)
}

/// Read a chord pressed in the UI. Returns the first bindable key press
/// together with the modifiers held at the time.
pub fn capture_hotkey(ctx: &egui::Context) -> Option<HotkeyConfig> {
    let (modifiers, events) = ctx.input(|i| (i.modifiers, i.events.clone()));
    events.into_iter().find_map(|event| match event {
        egui::Event::Key {
            key, pressed: true, ..
        } => Key::from_egui(key).map(|key| HotkeyConfig {
            key: Some(key),
            modifiers: HotkeyModifiers {
                ctrl: modifiers.ctrl,
                alt: modifiers.alt,
                shift: modifiers.shift,
                meta: modifiers.mac_cmd,
            },
        }),
        _ => None,
    })
}

/// Global start/stop hotkeys. The manager must stay alive for the
/// registrations to stay active.
pub struct HotkeyBridge {
    manager: GlobalHotKeyManager,
    registered: Vec<HotKey>,
    // Shared with the dispatcher thread so rebinding takes effect at once
    map: Arc<Mutex<HotkeyMap>>,
}

impl HotkeyBridge {
    pub fn register(start: &HotkeyConfig, stop: &HotkeyConfig) -> Result<Self, HotkeyError> {
        let manager = GlobalHotKeyManager::new().map_err(|e| HotkeyError::Manager(e.to_string()))?;
        let mut bridge = Self {
            manager,
            registered: Vec::new(),
            map: Arc::new(Mutex::new(HotkeyMap::default())),
        };
        bridge.rebind(start, stop)?;
        Ok(bridge)
    }

    /// Swap the registered chords for new ones. Old chords are released
    /// first. On failure the chords that did register stay active.
    pub fn rebind(&mut self, start: &HotkeyConfig, stop: &HotkeyConfig) -> Result<(), HotkeyError> {
        for hotkey in self.registered.drain(..) {
            if let Err(e) = self.manager.unregister(hotkey) {
                tracing::warn!("failed to unregister hotkey {}: {}", hotkey.id(), e);
            }
        }

        let (hotkeys, mut map) = plan_hotkeys(start, stop);
        let mut failure = None;
        for (hotkey, label) in hotkeys {
            match self.manager.register(hotkey) {
                Ok(()) => {
                    tracing::info!("Registered hotkey: {}", label);
                    self.registered.push(hotkey);
                }
                Err(e) => {
                    let id = Some(hotkey.id());
                    if map.start == id {
                        map.start = None;
                    }
                    if map.stop == id {
                        map.stop = None;
                    }
                    failure.get_or_insert(HotkeyError::Register {
                        label,
                        message: e.to_string(),
                    });
                }
            }
        }

        *self.map.lock().unwrap_or_else(PoisonError::into_inner) = map;
        failure.map_or(Ok(()), Err)
    }

    /// Forward hotkey presses to the supervisor on a background thread.
    pub fn spawn_dispatcher(&self, supervisor: Arc<Supervisor>) -> std::io::Result<JoinHandle<()>> {
        let map = Arc::clone(&self.map);
        thread::Builder::new()
            .name("hotkey-dispatcher".to_string())
            .spawn(move || {
                let receiver = GlobalHotKeyEvent::receiver();
                while let Ok(event) = receiver.recv() {
                    if event.state != HotKeyState::Pressed {
                        continue;
                    }
                    let action = map.lock().unwrap_or_else(PoisonError::into_inner).action_for(event.id);
                    if let Some(action) = action {
                        dispatch(&supervisor, action);
                    }
                }
                tracing::debug!("hotkey channel closed");
            })
    }
}

fn dispatch(supervisor: &Supervisor, action: HotkeyAction) {
    let start = match action {
        HotkeyAction::Start => true,
        HotkeyAction::Stop => false,
        HotkeyAction::Toggle => !supervisor.is_running(),
    };

    if start {
        match supervisor.start() {
            Ok(_) => {}
            Err(StartError::NoPrimaryTemplates) => {
                // Already reported to the status log.
            }
            Err(e) => supervisor.status().error(&format!("Could not start: {}", e)),
        }
    } else {
        supervisor.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_list_modifiers_first() {
        let config = HotkeyConfig {
            key: Some(Key::F6),
            modifiers: HotkeyModifiers {
                ctrl: true,
                shift: true,
                ..HotkeyModifiers::default()
            },
        };
        assert_eq!(hotkey_label(&config), "Ctrl+Shift+F6");
        assert_eq!(hotkey_label(&HotkeyConfig::plain(Key::PageUp)), "Page Up");
        assert_eq!(
            hotkey_label(&HotkeyConfig {
                key: None,
                modifiers: HotkeyModifiers::default()
            }),
            "Disabled"
        );
    }

    #[test]
    fn disabled_config_has_no_hotkey() {
        let config = HotkeyConfig {
            key: None,
            modifiers: HotkeyModifiers::default(),
        };
        assert!(hotkey_from_config(&config).is_none());
    }

    #[test]
    fn distinct_chords_have_distinct_ids() {
        let start = hotkey_from_config(&HotkeyConfig::plain(Key::F6)).unwrap();
        let stop = hotkey_from_config(&HotkeyConfig::plain(Key::F7)).unwrap();
        assert_ne!(start.id(), stop.id());
    }

    #[test]
    fn map_resolves_actions() {
        let map = HotkeyMap {
            start: Some(1),
            stop: Some(2),
        };
        assert_eq!(map.action_for(1), Some(HotkeyAction::Start));
        assert_eq!(map.action_for(2), Some(HotkeyAction::Stop));
        assert_eq!(map.action_for(3), None);

        let shared = HotkeyMap {
            start: Some(5),
            stop: Some(5),
        };
        assert_eq!(shared.action_for(5), Some(HotkeyAction::Toggle));
    }

    #[test]
    fn plan_registers_distinct_chords() {
        let (hotkeys, map) = plan_hotkeys(&HotkeyConfig::plain(Key::F6), &HotkeyConfig::plain(Key::F7));
        let labels: Vec<_> = hotkeys.iter().map(|(_, label)| label.as_str()).collect();
        assert_eq!(labels, vec!["F6", "F7"]);
        assert_eq!(map.action_for(hotkeys[0].0.id()), Some(HotkeyAction::Start));
        assert_eq!(map.action_for(hotkeys[1].0.id()), Some(HotkeyAction::Stop));
    }

    #[test]
    fn plan_shares_one_chord_as_toggle() {
        let chord = HotkeyConfig {
            key: Some(Key::F9),
            modifiers: HotkeyModifiers {
                alt: true,
                ..HotkeyModifiers::default()
            },
        };
        let (hotkeys, map) = plan_hotkeys(&chord, &chord);
        assert_eq!(hotkeys.len(), 1);
        assert_eq!(map.action_for(hotkeys[0].0.id()), Some(HotkeyAction::Toggle));
    }

    #[test]
    fn plan_skips_disabled_hotkeys() {
        let disabled = HotkeyConfig {
            key: None,
            modifiers: HotkeyModifiers::default(),
        };
        let (hotkeys, map) = plan_hotkeys(&disabled, &HotkeyConfig::plain(Key::F7));
        assert_eq!(hotkeys.len(), 1);
        assert_eq!(map.start, None);
        assert_eq!(map.stop, Some(hotkeys[0].0.id()));
    }

    fn key_event(key: egui::Key, pressed: bool, modifiers: egui::Modifiers) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed,
            repeat: false,
            modifiers,
        }
    }

    fn capture_from(events: Vec<egui::Event>, modifiers: egui::Modifiers) -> Option<HotkeyConfig> {
        let ctx = egui::Context::default();
        let input = egui::RawInput {
            modifiers,
            events,
            ..Default::default()
        };
        let mut captured = None;
        let _ = ctx.run(input, |ctx| captured = capture_hotkey(ctx));
        captured
    }

    #[test]
    fn capture_reads_key_and_held_modifiers() {
        let modifiers = egui::Modifiers {
            ctrl: true,
            command: true,
            shift: true,
            ..Default::default()
        };
        let captured = capture_from(vec![key_event(egui::Key::F8, true, modifiers)], modifiers);
        assert_eq!(
            captured,
            Some(HotkeyConfig {
                key: Some(Key::F8),
                modifiers: HotkeyModifiers {
                    ctrl: true,
                    shift: true,
                    ..HotkeyModifiers::default()
                },
            })
        );
    }

    #[test]
    fn capture_ignores_releases_and_unbindable_keys() {
        let none = egui::Modifiers::default();
        let events = vec![
            key_event(egui::Key::F8, false, none),
            key_event(egui::Key::Minus, true, none),
        ];
        assert_eq!(capture_from(events, none), None);
    }
}
