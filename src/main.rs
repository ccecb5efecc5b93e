#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use csv_explorer::config::{self, Settings};

fn main() -> Result<(), eframe::Error> {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).
    config::load_dotenv();
    let settings = Settings::from_env();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_min_inner_size([600.0, 400.0])
            .with_title("CSV Explorer"),
        ..Default::default()
    };
    eframe::run_native(
        "CSV Explorer",
        native_options,
        Box::new(|cc| Ok(Box::new(csv_explorer::App::new(cc, settings)))),
    )
}
