use crate::automation::supervisor::{LoopState, Supervisor};
use crate::core::hotkey::{capture_hotkey, hotkey_label, HotkeyBridge};
use crate::error::{HotkeyError, StartError, TemplateError};
use crate::settings::{AppSettings, HotkeyConfig};
use crate::ui::control_panel::{self, ControlAction, HotkeyTarget};
use crate::ui::help::render_help;
use crate::ui::log_panel::{render_log_panel, LogPanelAction};
use crate::ui::status::render_status;
use eframe::egui;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "PNG", "JPG", "BMP"];

pub struct SentinelApp {
    supervisor: Arc<Supervisor>,
    settings: AppSettings,
    // Kept alive so the global hotkeys stay registered
    hotkeys: Option<HotkeyBridge>,
    hotkey_error: Option<String>,
    capturing: Option<HotkeyTarget>,
    show_help: bool,
    applied_on_top: Option<bool>,
}

impl SentinelApp {
    pub fn new(
        supervisor: Arc<Supervisor>,
        settings: AppSettings,
        hotkeys: Option<HotkeyBridge>,
        hotkey_error: Option<String>,
    ) -> Self {
        Self {
            supervisor,
            settings,
            hotkeys,
            hotkey_error,
            capturing: None,
            show_help: false,
            applied_on_top: None,
        }
    }

    fn pick_image(title: &str) -> Option<PathBuf> {
        rfd::FileDialog::new()
            .set_title(title)
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file()
    }

    fn apply_settings(&mut self) {
        let s = &self.settings;
        self.supervisor
            .set_idle_threshold_minutes(s.idle_threshold_minutes.clone());
        self.supervisor.set_escalation_enabled(s.escalation_enabled);
        self.supervisor.set_escalation_hold(s.escalation_hold());
        self.supervisor.set_secondary_enabled(s.secondary_enabled);
        self.supervisor.set_kick_key(s.kick_key);
        self.supervisor.set_logging_enabled(s.logging_enabled);
        self.settings.auto_save();
    }

    fn warn(title: &str, description: &str) {
        rfd::MessageDialog::new()
            .set_level(rfd::MessageLevel::Warning)
            .set_title(title)
            .set_description(description)
            .set_buttons(rfd::MessageButtons::Ok)
            .show();
    }

    /// Pick an image and add it, with a warning dialog on failure.
    fn add_template(&self, kind: &str, add: impl Fn(&Supervisor, &Path) -> Result<String, TemplateError>) {
        let Some(path) = Self::pick_image(&format!("Add {} template", kind)) else {
            return;
        };
        if let Err(e) = add(&self.supervisor, &path) {
            Self::warn("Template not added", &add_failure_text(kind, &path, &e));
        }
    }

    fn remove_template(&self, id: &str, remove: impl Fn(&Supervisor, &str) -> Result<bool, TemplateError>) {
        if let Err(e) = remove(&self.supervisor, id) {
            Self::warn("Template not removed", &format!("Could not remove {}: {}", id, e));
        }
    }

    fn hotkey_mut(&mut self, target: HotkeyTarget) -> &mut HotkeyConfig {
        match target {
            HotkeyTarget::Start => &mut self.settings.start_hotkey,
            HotkeyTarget::Stop => &mut self.settings.stop_hotkey,
        }
    }

    /// Bind the next key pressed while a hotkey button is waiting.
    fn poll_hotkey_capture(&mut self, ctx: &egui::Context) {
        let Some(target) = self.capturing else {
            return;
        };
        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.capturing = None;
            return;
        }
        if let Some(config) = capture_hotkey(ctx) {
            *self.hotkey_mut(target) = config;
            self.capturing = None;
            self.rebind_hotkeys();
        }
    }

    /// Re-register the global hotkeys from the current settings.
    fn rebind_hotkeys(&mut self) {
        self.settings.auto_save();
        let start = self.settings.start_hotkey;
        let stop = self.settings.stop_hotkey;

        let result = match self.hotkeys.as_mut() {
            Some(bridge) => bridge.rebind(&start, &stop),
            None => HotkeyBridge::register(&start, &stop).and_then(|bridge| {
                let spawned = bridge.spawn_dispatcher(Arc::clone(&self.supervisor));
                self.hotkeys = Some(bridge);
                spawned.map(|_| ()).map_err(|e| HotkeyError::Manager(format!("dispatcher thread failed: {}", e)))
            }),
        };

        let status = self.supervisor.status();
        match result {
            Ok(()) => {
                self.hotkey_error = None;
                status.info(&format!(
                    "Hotkeys: start {}, stop {}",
                    hotkey_label(&start),
                    hotkey_label(&stop)
                ));
            }
            Err(e) => {
                status.warn(&format!("Hotkeys unavailable: {}", e));
                self.hotkey_error = Some(e.to_string());
            }
        }
    }

    fn start(&self) {
        match self.supervisor.start() {
            Ok(_) => {}
            Err(StartError::NoPrimaryTemplates) => {
                Self::warn("No templates", "Add at least one click template before starting.");
            }
            Err(e) => self
                .supervisor
                .status()
                .error(&format!("Could not start: {}", e)),
        }
    }

    fn handle(&mut self, action: ControlAction) {
        match action {
            ControlAction::AddPrimary => self.add_template("click", Supervisor::add_primary),
            ControlAction::RemovePrimary(id) => self.remove_template(&id, Supervisor::remove_primary),
            ControlAction::ReloadPrimary => {
                self.supervisor.reload_primary();
            }
            ControlAction::AddSecondary => self.add_template("kick", Supervisor::add_secondary),
            ControlAction::RemoveSecondary(id) => self.remove_template(&id, Supervisor::remove_secondary),
            ControlAction::ReloadSecondary => {
                self.supervisor.reload_secondary();
            }
            ControlAction::Start => self.start(),
            ControlAction::Stop => {
                self.supervisor.stop();
            }
            ControlAction::SettingsChanged => self.apply_settings(),
            ControlAction::CaptureHotkey(target) => self.capturing = Some(target),
            ControlAction::CancelCapture => self.capturing = None,
            ControlAction::HotkeysChanged => self.rebind_hotkeys(),
            ControlAction::None => {}
        }
    }

    fn sync_window_level(&mut self, ctx: &egui::Context) {
        if self.applied_on_top == Some(self.settings.always_on_top) {
            return;
        }
        let level = if self.settings.always_on_top {
            egui::viewport::WindowLevel::AlwaysOnTop
        } else {
            egui::viewport::WindowLevel::Normal
        };
        ctx.send_viewport_cmd(egui::ViewportCommand::WindowLevel(level));
        self.applied_on_top = Some(self.settings.always_on_top);
    }
}

impl eframe::App for SentinelApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.sync_window_level(ctx);
        self.poll_hotkey_capture(ctx);

        let state = self.supervisor.state();
        let lines = self.supervisor.status_lines();
        if render_log_panel(ctx, &lines, self.settings.logging_enabled) == LogPanelAction::Clear {
            self.supervisor.status().clear();
        }

        let primary_ids = self.supervisor.primary_ids();
        let secondary_ids = self.supervisor.secondary_ids();

        let mut action = ControlAction::None;
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                render_status(ui, state, self.hotkey_error.as_deref());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui
                        .add(egui::Button::new(egui::RichText::new("?").strong()).rounding(egui::Rounding::same(10.0)))
                        .clicked()
                    {
                        self.show_help = !self.show_help;
                    }
                });
            });
            ui.separator();

            egui::ScrollArea::vertical().show(ui, |ui| {
                action = control_panel::render_ui(
                    ui,
                    &mut self.settings,
                    &primary_ids,
                    &secondary_ids,
                    state,
                    self.capturing,
                );
            });
        });

        if self.show_help {
            let settings = &self.settings;
            egui::Window::new("Help")
                .open(&mut self.show_help)
                .resizable(true)
                .show(ctx, |ui| render_help(ui, settings));
        }

        self.handle(action);

        // Keep the log and state label fresh while the worker is active.
        if state != LoopState::Idle || self.capturing.is_some() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.supervisor.stop();
        self.settings.auto_save();
    }
}

fn add_failure_text(kind: &str, path: &Path, error: &TemplateError) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("Could not add {} as a {} template.\n\n{}", name, kind, error)
}
