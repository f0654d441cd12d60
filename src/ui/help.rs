use crate::core::hotkey::hotkey_label;
use crate::settings::AppSettings;
use eframe::egui;

pub fn render_help(ui: &mut egui::Ui, settings: &AppSettings) {
    ui.heading("Quick start");
    ui.label("- Add at least one click template (a small screenshot of the button).");
    ui.label("- Press Start, or use the hotkeys:");
    ui.label(format!(
        "  - {} starts, {} stops.",
        hotkey_label(&settings.start_hotkey),
        hotkey_label(&settings.stop_hotkey)
    ));

    ui.add_space(10.0);
    ui.heading("Templates");
    ui.label(format!(
        "- Click templates live in '{}'; every match is clicked, in file name order.",
        settings.primary_template_dir.display()
    ));
    ui.label(format!(
        "- Kick templates live in '{}'; a match presses the kick key once.",
        settings.secondary_template_dir.display()
    ));
    ui.label("- PNG, JPG and BMP files are accepted. Reload after editing the folders by hand.");

    ui.add_space(10.0);
    ui.heading("Settings");
    ui.label("- Idle minutes: quiet time before the escalation action; fractions allowed.");
    ui.label("- Escalation: holds the left mouse button when nothing was found for too long.");
    ui.label("- Kick detection: watch for kick templates and press the kick key.");
    ui.label("- Logging: show activity in the log panel.");
    ui.label("- Settings save automatically.");
}
