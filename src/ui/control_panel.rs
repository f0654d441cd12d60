use crate::automation::supervisor::LoopState;
use crate::core::hotkey::hotkey_label;
use crate::core::keys::Key;
use crate::settings::{AppSettings, HotkeyConfig};
use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyTarget {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    AddPrimary,
    RemovePrimary(String),
    ReloadPrimary,
    AddSecondary,
    RemoveSecondary(String),
    ReloadSecondary,
    Start,
    Stop,
    SettingsChanged,
    /// Wait for the next key press and bind it
    CaptureHotkey(HotkeyTarget),
    CancelCapture,
    HotkeysChanged,
    None,
}

fn template_list(
    ui: &mut egui::Ui,
    id_source: &str,
    ids: &[String],
    action: &mut ControlAction,
    remove: fn(String) -> ControlAction,
) {
    egui::ScrollArea::vertical()
        .id_source(id_source)
        .max_height(120.0)
        .auto_shrink([false, true])
        .show(ui, |ui| {
            if ids.is_empty() {
                ui.label(egui::RichText::new("(none)").italics().color(egui::Color32::DARK_GRAY));
            }
            for id in ids {
                ui.horizontal(|ui| {
                    if ui.small_button("x").on_hover_text("Delete this template").clicked() {
                        *action = remove(id.clone());
                    }
                    ui.label(id);
                });
            }
        });
}

fn hotkey_row(
    ui: &mut egui::Ui,
    target: HotkeyTarget,
    config: &mut HotkeyConfig,
    capturing: Option<HotkeyTarget>,
    action: &mut ControlAction,
) {
    let mut changed = false;
    if capturing == Some(target) {
        if ui
            .button("Press a key...")
            .on_hover_text("Esc or click to cancel")
            .clicked()
        {
            *action = ControlAction::CancelCapture;
        }
    } else if ui
        .button(hotkey_label(config))
        .on_hover_text("Click, then press the new key")
        .clicked()
    {
        *action = ControlAction::CaptureHotkey(target);
    }

    changed |= ui.checkbox(&mut config.modifiers.ctrl, "Ctrl").changed();
    changed |= ui.checkbox(&mut config.modifiers.alt, "Alt").changed();
    changed |= ui.checkbox(&mut config.modifiers.shift, "Shift").changed();
    changed |= ui.checkbox(&mut config.modifiers.meta, "Win").changed();

    if config.key.is_some() && ui.small_button("Clear").clicked() {
        config.key = None;
        changed = true;
    }
    if changed && *action == ControlAction::None {
        *action = ControlAction::HotkeysChanged;
    }
}

/// Main controls. Settings edits are applied to `settings` in place and
/// reported as `SettingsChanged`.
pub fn render_ui(
    ui: &mut egui::Ui,
    settings: &mut AppSettings,
    primary_ids: &[String],
    secondary_ids: &[String],
    state: LoopState,
    capturing: Option<HotkeyTarget>,
) -> ControlAction {
    let mut action = ControlAction::None;

    ui.heading("Click templates");
    ui.horizontal(|ui| {
        if ui.button("Add...").clicked() {
            action = ControlAction::AddPrimary;
        }
        if ui.button("Reload").clicked() {
            action = ControlAction::ReloadPrimary;
        }
        ui.label(format!("{} loaded", primary_ids.len()));
    });
    template_list(ui, "primary_templates", primary_ids, &mut action, ControlAction::RemovePrimary);

    ui.separator();

    ui.heading("Kick templates");
    ui.horizontal(|ui| {
        if ui.button("Add...").clicked() {
            action = ControlAction::AddSecondary;
        }
        if ui.button("Reload").clicked() {
            action = ControlAction::ReloadSecondary;
        }
        ui.label(format!("{} loaded", secondary_ids.len()));
    });
    template_list(ui, "secondary_templates", secondary_ids, &mut action, ControlAction::RemoveSecondary);

    ui.separator();

    // Settings
    let mut changed = false;
    ui.horizontal(|ui| {
        ui.label("Idle minutes:");
        changed |= ui
            .add(egui::TextEdit::singleline(&mut settings.idle_threshold_minutes).desired_width(60.0))
            .changed();
        changed |= ui
            .checkbox(&mut settings.escalation_enabled, "Escalation")
            .on_hover_text("Hold the left mouse button after the idle time passes without a match")
            .changed();
    });

    ui.horizontal(|ui| {
        changed |= ui.checkbox(&mut settings.secondary_enabled, "Kick detection").changed();
        ui.label("Kick key:");
        egui::ComboBox::from_id_source("kick_key")
            .selected_text(settings.kick_key.label())
            .show_ui(ui, |ui| {
                for key in Key::ALL {
                    changed |= ui
                        .selectable_value(&mut settings.kick_key, *key, key.label())
                        .changed();
                }
            });
    });

    ui.horizontal(|ui| {
        changed |= ui.checkbox(&mut settings.logging_enabled, "Logging").changed();
        changed |= ui.checkbox(&mut settings.always_on_top, "Always on top").changed();
    });

    if changed && action == ControlAction::None {
        action = ControlAction::SettingsChanged;
    }

    ui.horizontal(|ui| {
        ui.label("Start hotkey:");
        hotkey_row(ui, HotkeyTarget::Start, &mut settings.start_hotkey, capturing, &mut action);
    });
    ui.horizontal(|ui| {
        ui.label("Stop hotkey:");
        hotkey_row(ui, HotkeyTarget::Stop, &mut settings.stop_hotkey, capturing, &mut action);
    });

    ui.separator();

    // Controls
    ui.horizontal(|ui| match state {
        LoopState::Running => {
            ui.colored_label(egui::Color32::GREEN, "RUNNING");
            if ui
                .button(format!("Stop ({})", hotkey_label(&settings.stop_hotkey)))
                .clicked()
            {
                action = ControlAction::Stop;
            }
        }
        LoopState::Stopping => {
            ui.add_enabled(false, egui::Button::new("Stopping..."));
        }
        LoopState::Idle => {
            if ui
                .button(format!("Start ({})", hotkey_label(&settings.start_hotkey)))
                .clicked()
            {
                action = ControlAction::Start;
            }
        }
    });

    action
}
