// Prevents additional console window on Windows in release, DO NOT REMOVE!!
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use log::{error, info, warn};
use std::time::Duration;
use tauri::Manager;
use tauri::menu::{MenuBuilder, SubmenuBuilder};

mod commands;
mod config;
mod errors;
mod services;
mod utils;

const STALE_SCRATCH_AGE: Duration = Duration::from_secs(24 * 60 * 60);

fn main() {
    utils::logger::init_logger();

    tauri::Builder::default()
        .plugin(tauri_plugin_store::Builder::default().build())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            // Create app submenu
            let app_menu = SubmenuBuilder::new(app, "App")
                .text("about", "About Supertonic Studio")
                .separator()
                .quit()
                .build()?;

            let edit_menu = SubmenuBuilder::new(app, "Edit")
                .cut()
                .copy()
                .paste()
                .select_all()
                .build()?;
            // Create main menu
            let menu = MenuBuilder::new(app).items(&[&app_menu, &edit_menu]).build()?;

            app.set_menu(menu)?;

            // Engine resolution failing must not keep the window from
            // opening; the first generate will surface a launch error.
            let engine = match config::EngineConfig::resolve(app.handle()) {
                Ok(engine) => {
                    info!("TTS engine: {}", engine.binary.display());
                    engine
                }
                Err(e) => {
                    error!("TTS engine not located at startup: {}", e);
                    config::EngineConfig::fallback()
                }
            };
            let temp_root = engine.temp_root.clone();
            app.manage(config::AppContext::new(engine));

            // Sweep scratch directories left behind by crashed sessions
            tauri::async_runtime::spawn(async move {
                match services::engine::sweep_stale_scratch(&temp_root, STALE_SCRATCH_AGE).await {
                    Ok(0) => {}
                    Ok(n) => info!("Swept {} stale scratch directories", n),
                    Err(e) => warn!("Stale scratch sweep failed: {}", e),
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::generate_tts,
            commands::cancel_generation,
            commands::list_voices,
            commands::list_languages,
            commands::load_ui_settings,
            commands::save_ui_settings,
            commands::save_audio,
            commands::cleanup_generation,
            commands::check_file_exists,
            commands::open_file,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
