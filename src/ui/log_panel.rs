use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPanelAction {
    Clear,
    None,
}

fn line_color(line: &str) -> egui::Color32 {
    let lower = line.to_ascii_lowercase();
    if lower.contains("error") || lower.contains("failed") {
        egui::Color32::from_rgb(230, 120, 120)
    } else if lower.contains("clicked") || lower.contains("kick") || lower.contains("escalation") {
        egui::Color32::from_rgb(168, 226, 187)
    } else {
        egui::Color32::from_rgb(200, 200, 200)
    }
}

/// Status lines, newest at the bottom.
pub fn render_log_panel(ctx: &egui::Context, lines: &[String], logging_enabled: bool) -> LogPanelAction {
    let mut action = LogPanelAction::None;

    egui::SidePanel::right("log_panel")
        .resizable(true)
        .default_width(320.0)
        .min_width(220.0)
        .show(ctx, |ui| {
            egui::Frame::none()
                .fill(egui::Color32::from_rgb(12, 12, 12))
                .inner_margin(egui::Margin::same(8.0))
                .show(ui, |ui| {
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new("Log")
                                .strong()
                                .color(egui::Color32::LIGHT_GRAY),
                        );
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("Clear").clicked() {
                                action = LogPanelAction::Clear;
                            }
                            ui.label(
                                egui::RichText::new(format!("{} lines", lines.len()))
                                    .small()
                                    .color(egui::Color32::DARK_GRAY),
                            );
                        });
                    });

                    ui.add_space(6.0);
                    egui::ScrollArea::vertical()
                        .auto_shrink([false, false])
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            if lines.is_empty() {
                                let hint = if logging_enabled {
                                    "No log entries yet."
                                } else {
                                    "Logging is off."
                                };
                                ui.label(
                                    egui::RichText::new(hint)
                                        .italics()
                                        .color(egui::Color32::DARK_GRAY),
                                );
                            }
                            for line in lines {
                                ui.label(
                                    egui::RichText::new(line)
                                        .monospace()
                                        .color(line_color(line)),
                                );
                            }
                        });
                });
        });

    action
}
