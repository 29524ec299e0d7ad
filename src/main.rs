mod converters;
mod models;
mod ui;

use eframe::egui;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("starting pandoc frontend {}", env!("CARGO_PKG_VERSION"));

    let native_options = eframe::NativeOptions {
        initial_window_size: Some(egui::vec2(600.0, 460.0)),
        min_window_size: Some(egui::vec2(480.0, 360.0)),
        ..Default::default()
    };

    eframe::run_native(
        "Pandoc GUI - document converter",
        native_options,
        Box::new(|cc| Box::new(ui::App::new(cc))),
    )
}
