use afk_sentinel::app::SentinelApp;
use afk_sentinel::automation::context::{DeviceFactory, LoopOptions};
use afk_sentinel::automation::supervisor::Supervisor;
use afk_sentinel::automation::templates::TemplateStore;
use afk_sentinel::core::hotkey::HotkeyBridge;
use afk_sentinel::core::platform::{enable_dpi_awareness, DesktopDevices};
use afk_sentinel::logging::{init_tracing, StatusLog};
use afk_sentinel::settings::AppSettings;
use anyhow::Result;
use eframe::egui;
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let _log_guard = init_tracing(Path::new("logs"), cfg!(debug_assertions))?;
    enable_dpi_awareness();

    let settings = AppSettings::load();

    let status = StatusLog::default();
    status.set_enabled(settings.logging_enabled);

    let templates = Arc::new(TemplateStore::new(
        settings.primary_template_dir.clone(),
        settings.secondary_template_dir.clone(),
    ));
    let devices: Arc<dyn DeviceFactory> = Arc::new(DesktopDevices);
    let supervisor = Arc::new(Supervisor::new(
        templates,
        devices,
        LoopOptions::from(&settings),
        status,
    ));
    supervisor.reload_primary();
    supervisor.reload_secondary();

    let (hotkeys, hotkey_error) = match HotkeyBridge::register(&settings.start_hotkey, &settings.stop_hotkey) {
        Ok(bridge) => match bridge.spawn_dispatcher(Arc::clone(&supervisor)) {
            Ok(_) => (Some(bridge), None),
            Err(e) => (Some(bridge), Some(format!("dispatcher thread failed: {}", e))),
        },
        Err(e) => (None, Some(e.to_string())),
    };
    if let Some(err) = &hotkey_error {
        supervisor.status().warn(&format!("Hotkeys unavailable: {}", err));
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([760.0, 480.0])
            .with_title("AFK Sentinel"),
        ..Default::default()
    };

    eframe::run_native(
        "AFK Sentinel",
        options,
        Box::new(move |_cc| Box::new(SentinelApp::new(supervisor, settings, hotkeys, hotkey_error))),
    )
    .map_err(|e| anyhow::anyhow!("UI failed: {}", e))?;

    tracing::info!("shutting down");
    Ok(())
}
