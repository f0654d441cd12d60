use crate::automation::supervisor::LoopState;
use eframe::egui;

pub fn state_label(state: LoopState) -> &'static str {
    match state {
        LoopState::Idle => "Stopped",
        LoopState::Running => "Running",
        LoopState::Stopping => "Stopping...",
    }
}

pub fn render_status(ui: &mut egui::Ui, state: LoopState, hotkey_error: Option<&str>) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("Status:").strong());

        let status_color = match state {
            LoopState::Running => egui::Color32::from_rgb(100, 255, 100),
            LoopState::Stopping => egui::Color32::from_rgb(255, 200, 100),
            LoopState::Idle => egui::Color32::GRAY,
        };

        ui.label(egui::RichText::new(state_label(state)).color(status_color));
    });

    if let Some(err) = hotkey_error {
        let full = format!("Hotkey error: {}", err);
        let shortened = if full.chars().count() > 80 {
            format!("{}...", full.chars().take(77).collect::<String>())
        } else {
            full.clone()
        };
        let label = egui::RichText::new(shortened).color(egui::Color32::from_rgb(200, 120, 120));
        let response = ui.label(label);
        if full.chars().count() > 80 {
            response.on_hover_text(full);
        }
    }
}
